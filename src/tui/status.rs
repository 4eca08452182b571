use crate::coordinator::ScanCoordinator;
use crate::store::ScanView;
use crate::types::ScanPhase;
use crate::tui::create_block;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// STATUS pane: current status message, session phase and last exit code.
pub fn render(frame: &mut Frame, area: Rect, view: &ScanView, coordinator: &ScanCoordinator) {
    let phase = coordinator.phase();
    let (icon, color) = phase_icon_and_color(phase);

    let mut spans = vec![
        Span::styled(format!("{} ", icon), Style::default().fg(color)),
        Span::styled(view.status(), Style::default().fg(Color::White)),
    ];
    if let Some(code) = coordinator.last_exit_code() {
        spans.push(Span::styled(
            format!("  (exit {})", code),
            Style::default().fg(Color::Gray),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(create_block("status"));
    frame.render_widget(paragraph, area);
}

/// Get status icon and color for a session phase
fn phase_icon_and_color(phase: ScanPhase) -> (&'static str, Color) {
    match phase {
        ScanPhase::Idle => ("·", Color::Gray),
        ScanPhase::Scanning => ("🔄", Color::Yellow),
        ScanPhase::Done => ("✅", Color::Green),
        ScanPhase::Failed => ("❌", Color::Red),
        ScanPhase::Cancelled => ("✋", Color::Magenta),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_icon_and_color() {
        let (icon, color) = phase_icon_and_color(ScanPhase::Scanning);
        assert_eq!(icon, "🔄");
        assert_eq!(color, Color::Yellow);

        let (icon, color) = phase_icon_and_color(ScanPhase::Done);
        assert_eq!(icon, "✅");
        assert_eq!(color, Color::Green);

        let (icon, color) = phase_icon_and_color(ScanPhase::Failed);
        assert_eq!(icon, "❌");
        assert_eq!(color, Color::Red);
    }
}
