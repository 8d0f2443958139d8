use std::{
    io,
    net::UdpSocket,
    process::{Child, Command, Stdio},
};

use crate::error::{Result, TeleopError};

pub fn udp_sock(bind_addr: &str) -> Result<UdpSocket> {
    UdpSocket::bind(bind_addr).map_err(|e| {
        tracing::error!("can't create udp socket for {bind_addr} : {}", e);
        TeleopError::Io(e)
    })
}

/// Read timeouts surface as `WouldBlock` on unix and `TimedOut` on windows.
pub fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Arguments for an ffmpeg process that reads the H.264 stream from
/// `source` and writes raw `bgr24` frames of the given size to stdout.
pub fn decoder_args(source: &str, width: u32, height: u32) -> Vec<String> {
    let size = format!("{width}x{height}");
    [
        "-loglevel",
        "error",
        "-fflags",
        "nobuffer",
        "-flags",
        "low_delay",
        "-i",
        source,
        "-f",
        "rawvideo",
        "-pix_fmt",
        "bgr24",
        "-s",
        size.as_str(),
        "-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn start_decoder(program: &str, args: &[String]) -> Result<Child> {
    let method_name = "start_decoder";
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            tracing::warn!(method_name, program, "can't execute decoder: {}", e);
            TeleopError::Decoder(format!("{program}: {e}"))
        })?;
    tracing::info!(method_name, program, pid = child.id(), "decoder started");
    Ok(child)
}
