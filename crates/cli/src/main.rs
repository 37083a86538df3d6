mod source;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use rtsp::{ClientConfig, ClientSession, MountParams, Result, RtspError, Server};

use crate::source::LengthPrefixedFile;

#[derive(Parser)]
#[command(name = "rtsp-tool", about = "RTSP server and stream probe")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve every file in a directory as a mount
    Serve(ServeArgs),
    /// Play a stream and print the first RTP packets
    Probe(ProbeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address (host:port)
    #[arg(long, short, default_value = "0.0.0.0:8554")]
    bind: String,

    /// Directory of length-prefixed frame files
    #[arg(long, short)]
    root: PathBuf,

    #[arg(long, default_value_t = 20)]
    fps: u32,

    #[arg(long, default_value_t = 26)]
    payload_type: u8,

    #[arg(long, default_value = "JPEG")]
    encoding: String,
}

#[derive(Args)]
struct ProbeArgs {
    /// rtsp://[user:pass@]host[:port]/path
    url: String,

    /// Number of RTP packets to read before tearing down
    #[arg(long, short, default_value_t = 10)]
    packets: usize,

    /// I/O timeout in seconds
    #[arg(long, default_value_t = 2)]
    timeout: u64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let result = match Cli::parse().command {
        Command::Serve(args) => serve(args),
        Command::Probe(args) => probe(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn serve(args: ServeArgs) -> Result<()> {
    let params = MountParams {
        payload_type: args.payload_type,
        encoding: args.encoding,
        frame_rate: args.fps,
        ..MountParams::default()
    };

    let mut server = Server::new(&args.bind);
    for (path, file) in frame_files(&args.root)? {
        tracing::info!(mount = %path, file = %file.display(), "mounting");
        server.mount(&path, LengthPrefixedFile::factory(file), params.clone());
    }
    if server.mounts().paths().is_empty() {
        return Err(RtspError::MountNotFound(format!(
            "no frame files in {}",
            args.root.display()
        )));
    }

    server.start()?;
    println!(
        "RTSP server on {}, press Enter to stop",
        server.local_addr()?
    );
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    server.stop();
    Ok(())
}

/// Regular files under `root`, sorted, keyed by `/<file stem>`.
fn frame_files(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((format!("/{stem}"), path.clone()));
        }
    }
    files.sort();
    Ok(files)
}

fn probe(args: ProbeArgs) -> Result<()> {
    let config = ClientConfig {
        timeout: Duration::from_secs(args.timeout),
        ..ClientConfig::default()
    };
    let mut client = ClientSession::connect(&args.url, config)?;

    let options = client.options()?;
    tracing::info!(public = ?options.get_header("Public"), "OPTIONS");

    client.describe()?;
    let Some(video) = client.video_media() else {
        return Err(RtspError::MountNotFound(format!("{}: no video media", args.url)));
    };
    tracing::info!(format = %video.format, rtpmap = ?video.attributes.get("rtpmap"), stream = ?client.stream_uri(), "DESCRIBE");

    client.setup()?;
    tracing::info!(session = ?client.session_id(), timeout = ?client.session_timeout(), "SETUP");

    client.play()?;
    for _ in 0..args.packets {
        let packet = client.read_rtp()?;
        let h = packet.header;
        tracing::info!(
            pt = h.payload_type,
            seq = h.sequence,
            ts = h.timestamp,
            ssrc = format_args!("{:08x}", h.ssrc),
            marker = h.marker,
            len = packet.payload.len(),
            "RTP"
        );
    }

    client.teardown()?;
    Ok(())
}
