use crate::store::ScanView;
use crate::types::HandshakeRecord;
use crate::tui::create_block;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Style},
    widgets::{Row, Table},
    Frame,
};

/// HANDSHAKES pane: insertion-ordered table of discovered records.
pub fn render(frame: &mut Frame, area: Rect, view: &ScanView) {
    let records = view.records();

    let rows: Vec<Row> = records.iter().map(record_row).collect();
    let widths = [
        Constraint::Percentage(40),
        Constraint::Percentage(35),
        Constraint::Percentage(25),
    ];

    let title = pane_title(records.len());
    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["SSID", "MAC", "STATE"])
                .style(Style::default().fg(Color::Cyan)),
        )
        .block(create_block(&title));

    frame.render_widget(table, area);
}

fn record_row(record: &HandshakeRecord) -> Row<'static> {
    let state_color = match record.state.as_str() {
        "captured" => Color::Green,
        _ => Color::Yellow,
    };
    Row::new(vec![record.ssid.clone(), record.mac.clone(), record.state.clone()])
        .style(Style::default().fg(state_color))
}

fn pane_title(count: usize) -> String {
    format!("handshakes ({})", count)
}
