//! WebSocket echo demo
//!
//! Serves a room-scoped echo endpoint at `ws://127.0.0.1:3001/rooms/{room}`.
//! Each connection is greeted with its room name, then every text frame
//! is echoed back until the client closes.
//!
//! Run with: `cargo run --example websocket_echo`
//! Connect with: `websocat ws://127.0.0.1:3001/rooms/lobby`

use fastack::logging::{LogConfig, LogFormat, LogLevel, info};
use fastack::prelude::*;

#[derive(Clone)]
struct MessageOfTheDay(&'static str);

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _guard = LogConfig::new()
        .level(LogLevel::Info)
        .format(LogFormat::Pretty)
        .with_colors(true)
        .init();

    let app = App::builder()
        .config(AppConfig::new().title("Echo Rooms"))
        .state(MessageOfTheDay("be excellent to each other"))
        .process_websocket(|socket| async move {
            // The private room needs a token before the accept
            let is_private = socket.path_param("room").map(String::as_str) == Some("private");
            if is_private && socket.header("authorization").is_none() {
                return Err(Error::Unauthorized("private room requires a token".to_string()));
            }
            Ok(())
        })
        .websocket("/rooms/{room}", |socket| async move {
            let room = socket
                .path_param("room")
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());

            socket.accept().await?;
            info!(room = %room, connection = socket.id(), "Client joined");

            if let Some(motd) = socket.state().get_arc::<MessageOfTheDay>() {
                socket.send_text(format!("[{room}] {}", motd.0)).await?;
            }

            loop {
                match socket.receive().await? {
                    WebSocketMessage::Text(text) => {
                        socket.send_text(format!("[{room}] {text}")).await?;
                    }
                    WebSocketMessage::Close => break,
                    _ => {}
                }
            }

            info!(room = %room, connection = socket.id(), "Client left");
            Ok(())
        })
        .build();

    println!("Echo rooms running at ws://127.0.0.1:3001/rooms/{{room}}");
    app.serve_websocket(3001).await
}
