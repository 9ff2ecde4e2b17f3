use crate::cli::Command;
use crate::config::ShmctlConfig;
use anyhow::{Context, Result};
use posixshmem::{Access, RetryConfig, SegmentName, SharedMemorySegment};
use std::io::Write;

const HEX_BYTES_PER_LINE: usize = 16;

/// Execute one command, writing its report to `out`.
///
/// Handles are closed when each command returns; only `unlink` removes a
/// name from the namespace.
pub fn run(command: &Command, config: &ShmctlConfig, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Create {
            name,
            size,
            or_attach,
        } => {
            let name = normalize(name)?;
            let options = config.segment_options(Access::ReadWrite);
            let segment = if *or_attach {
                SharedMemorySegment::create_or_attach_with(name.as_str(), *size, &options)
            } else {
                SharedMemorySegment::create_with(name.as_str(), *size, &options)
            }
            .with_context(|| format!("Failed to create segment {name}"))?;

            let verb = if segment.is_created() { "created" } else { "attached" };
            writeln!(out, "{verb} {} ({} bytes)", segment.name(), segment.size())?;
        }
        Command::Info { name } => {
            let segment = attach(name, config, Access::ReadOnly)?;
            writeln!(
                out,
                "{} size={} fd={}",
                segment.name(),
                segment.size(),
                segment.fd()?
            )?;
        }
        Command::Write { name, data, offset } => {
            let mut segment = attach(name, config, Access::ReadWrite)?;
            segment
                .write_at(*offset, data.as_bytes())
                .with_context(|| format!("Failed to write to {}", segment.name()))?;
            segment.flush()?;
            writeln!(out, "wrote {} bytes at offset {offset}", data.len())?;
        }
        Command::Read { name, offset, len } => {
            let segment = attach(name, config, Access::ReadOnly)?;
            let len = len.unwrap_or_else(|| segment.size().saturating_sub(*offset));
            let bytes = segment
                .read_at(*offset, len)
                .with_context(|| format!("Failed to read from {}", segment.name()))?;
            write_hex(out, *offset, bytes)?;
        }
        Command::Unlink { name } => {
            let name = normalize(name)?;
            posixshmem::unlink(name.as_str()).with_context(|| format!("Failed to unlink {name}"))?;
            writeln!(out, "unlinked {name}")?;
        }
        Command::Wait { name, attempts } => {
            let name = normalize(name)?;
            let retry = RetryConfig {
                max_attempts: *attempts,
                ..RetryConfig::default()
            };
            let segment = SharedMemorySegment::attach_with_retry(
                name.as_str(),
                &config.segment_options(Access::ReadOnly),
                &retry,
            )
            .with_context(|| format!("Segment {name} did not become ready"))?;
            writeln!(out, "ready {} ({} bytes)", segment.name(), segment.size())?;
        }
    }
    Ok(())
}

fn normalize(name: &str) -> Result<SegmentName> {
    Ok(SegmentName::normalized(name)?)
}

fn attach(name: &str, config: &ShmctlConfig, access: Access) -> Result<SharedMemorySegment> {
    let name = normalize(name)?;
    SharedMemorySegment::attach_with(name.as_str(), &config.segment_options(access))
        .with_context(|| format!("Failed to attach to {name}"))
}

/// `offset: hex bytes` lines, 16 bytes each
fn write_hex(out: &mut impl Write, offset: usize, bytes: &[u8]) -> std::io::Result<()> {
    for (line, chunk) in bytes.chunks(HEX_BYTES_PER_LINE).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        writeln!(
            out,
            "{:08x}: {}",
            offset + line * HEX_BYTES_PER_LINE,
            hex.join(" ")
        )?;
    }
    Ok(())
}
