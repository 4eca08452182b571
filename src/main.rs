use eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use warwalker::types::{is_terminal_status, StoreEvent};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging first
    if let Err(e) = warwalker::init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    // Add a gigantic divider to separate runs
    log::info!("================================================================================");
    log::info!("🚀 NEW CAPTURE SESSION STARTING");
    log::info!("================================================================================");

    let cli = warwalker::cli::parse();
    log::info!("[main] config: interpreter={} script={} no_tui={}",
        cli.interpreter, cli.script.display(), cli.no_tui);

    let (store, view) = warwalker::ScanStore::new();
    let coordinator = Arc::new(
        warwalker::ScanCoordinator::new(store, cli.interpreter.clone(), cli.script.clone())
            .with_parser(Box::new(warwalker::TaggedLineParser)),
    );

    if cli.no_tui {
        // Headless mode - run one scan and print every state transition
        println!("🎯 Scanning: {} {}", cli.interpreter, cli.script.display());
        println!("────────────────────────────────────────────────────────────────────────────────");

        let mut events = view.subscribe();
        let printer = tokio::spawn(async move {
            // Drain until the session's terminal status so nothing is lost.
            while let Ok(event) = events.recv().await {
                match event {
                    StoreEvent::StatusChanged(text) => {
                        let finished = is_terminal_status(&text);
                        println!("status: {}", text);
                        if finished {
                            break;
                        }
                    }
                    StoreEvent::RecordAppended(record) => println!(
                        "handshake: ssid={} mac={} state={}",
                        record.ssid, record.mac, record.state
                    ),
                }
            }
        });

        let result = coordinator.start_scan().await;
        let _ = printer.await;
        result?;

        println!("────────────────────────────────────────────────────────────────────────────────");
        println!("handshakes captured: {}", view.record_count());
    } else {
        // TUI mode
        let mut terminal = warwalker::init_terminal()?;
        let app = warwalker::TuiApp::new(
            view,
            Arc::clone(&coordinator),
            Duration::from_millis(cli.refresh_rate),
        );

        // Run the TUI application
        let result = app.run(&mut terminal);

        // Restore terminal
        warwalker::restore_terminal(&mut terminal)?;

        // Handle any TUI errors
        result?;
    }

    Ok(())
}
