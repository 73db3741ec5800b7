//! Produce/consume demo against a running broker.
//!
//! Start the broker first:
//! ```bash
//! cargo run --bin segment-log-broker
//! ```

use segment_log::protocol::{frame, request::Request, response::Response};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let addr = std::env::var("SEGLOG_ADDR").unwrap_or_else(|_| "127.0.0.1:9092".to_string());

    println!("Connecting to broker at {}...", addr);
    let mut stream = TcpStream::connect(&addr).await?;

    let messages = ["hello", "from", "segment-log"];
    let mut offsets = Vec::new();

    for msg in messages {
        let request = Request::Produce {
            record: msg.as_bytes().to_vec(),
        };
        frame::write_frame(&mut stream, &request.encode()).await?;
        let response = Response::decode(&frame::read_frame(&mut stream).await?)?;

        match response {
            Response::Produced { offset } => {
                println!("  Offset {}: {}", offset, msg);
                offsets.push(offset);
            }
            Response::Error { code, message } => {
                anyhow::bail!("produce failed (code {}): {}", code, message);
            }
            other => anyhow::bail!("unexpected response: {:?}", other),
        }
    }

    println!("\nReading back...");
    for offset in offsets {
        let request = Request::Consume { offset };
        frame::write_frame(&mut stream, &request.encode()).await?;
        let response = Response::decode(&frame::read_frame(&mut stream).await?)?;

        match response {
            Response::Consumed { offset, record } => {
                println!("  Offset {}: {}", offset, String::from_utf8_lossy(&record));
            }
            Response::NotFound { offset } => println!("  Offset {}: not found", offset),
            other => anyhow::bail!("unexpected response: {:?}", other),
        }
    }

    Ok(())
}
