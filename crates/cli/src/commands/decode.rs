//! `decode` command implementation.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use embedding::EmbeddingReader;
use tracing::info;

use crate::cli::DecodeArgs;
use crate::error::Result;

/// Execute the `decode` command
pub fn run_decode(args: &DecodeArgs) -> Result<()> {
    let input = File::open(&args.input)?;
    let mut reader = EmbeddingReader::new(input, &args.uid);

    let written = match &args.output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            let n = io::copy(&mut reader, &mut out)?;
            out.flush()?;
            n
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let n = io::copy(&mut reader, &mut out)?;
            out.flush()?;
            n
        }
    };

    info!(
        input = %args.input.display(),
        bytes = written,
        "Decoded embedded resource"
    );
    Ok(())
}
