use std::error::Error;
use tracing::{info, warn};
use gt06::{tcp::Gt06TcpServer, Frame, Message, SessionId};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8000".to_string());
    info!("Starting GT06 collection server on {}...", addr);

    let server = Gt06TcpServer::bind(&addr).await?;
    server.run(handle_frame).await?;

    Ok(())
}

/// Log the typed content of every frame a terminal sends
async fn handle_frame(session_id: SessionId, frame: Frame) {
    match Message::decode(&frame) {
        Ok(Message::Login(login)) => {
            info!(
                "Session {}: login from device {}, model 0x{:04X}",
                session_id, login.identity, login.model_code
            );
        }
        Ok(Message::Location(report)) => {
            info!(
                "Session {}: position {:.6}, {:.6} at {} km/h, odometer {} m",
                session_id,
                report.gps.latitude.degrees(),
                report.gps.longitude.degrees(),
                report.gps.speed,
                report.odometer
            );
        }
        Ok(Message::Alarm(report)) => {
            info!(
                "Session {}: alarm 0x{:04X}, terminal info {:?}",
                session_id, report.alarm_language, report.terminal_info
            );
        }
        Ok(Message::Heartbeat(heartbeat)) => {
            info!(
                "Session {}: heartbeat, {:.2} V, battery {}, signal {}",
                session_id,
                heartbeat.external_voltage.volts(),
                heartbeat.battery_level,
                heartbeat.signal_strength
            );
        }
        Err(e) => {
            warn!(
                "Session {}: undecoded {:?} frame ({} bytes): {}",
                session_id,
                frame.kind,
                frame.payload.len(),
                e
            );
        }
    }
}
