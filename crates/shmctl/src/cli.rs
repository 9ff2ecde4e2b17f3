use clap::{Parser, Subcommand};

/// Inspect and manage POSIX shared memory segments
#[derive(Parser, Debug)]
#[command(name = "shmctl", version)]
pub struct Cli {
    /// Octal mode bits for newly created segments (overrides SHMCTL_PERMISSIONS)
    #[arg(long, global = true, value_parser = parse_octal)]
    pub permissions: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create a segment; fails if the name already exists
    Create {
        name: String,
        /// Size in bytes, optionally with a K/M/G suffix
        #[arg(value_parser = parse_size)]
        size: usize,
        /// Attach instead of failing when the segment already exists
        #[arg(long)]
        or_attach: bool,
    },
    /// Print name, size and descriptor of an existing segment
    Info { name: String },
    /// Copy DATA (UTF-8) into the segment
    Write {
        name: String,
        data: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Hex-dump bytes of the segment
    Read {
        name: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Number of bytes (defaults to the rest of the segment)
        #[arg(long)]
        len: Option<usize>,
    },
    /// Remove the name from the namespace
    Unlink { name: String },
    /// Block until the segment exists and has been sized
    Wait {
        name: String,
        #[arg(long, default_value_t = 20)]
        attempts: u32,
    },
}

pub fn parse_octal(value: &str) -> Result<u32, String> {
    let digits = value.strip_prefix("0o").unwrap_or(value);
    let mode = u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode: {e}"))?;
    if mode > 0o7777 {
        return Err(format!("mode {value} out of range"));
    }
    Ok(mode)
}

pub fn parse_size(value: &str) -> Result<usize, String> {
    let (digits, multiplier) = match value.chars().last() {
        Some('K' | 'k') => (&value[..value.len() - 1], 1024),
        Some('M' | 'm') => (&value[..value.len() - 1], 1024 * 1024),
        Some('G' | 'g') => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        _ => (value, 1),
    };
    let count: usize = digits
        .parse()
        .map_err(|e| format!("invalid size {value}: {e}"))?;
    count
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size {value} overflows"))
}
