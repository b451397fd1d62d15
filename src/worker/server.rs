//! Worker request loop

use crate::error::Result;
use crate::worker::protocol::{read_frame, read_magic, write_frame, Request, Response};
use crate::worker::Registry;
use std::io::{BufReader, BufWriter, Read, Write};

/// Serve requests from `reader` until it is closed
///
/// Returns the number of requests answered. Task failures are answered as
/// failures; only I/O and framing problems end the loop with an error.
pub fn serve<R: Read, W: Write>(registry: &Registry, reader: R, writer: W) -> Result<u64> {
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);

    read_magic(&mut reader)?;

    let mut served = 0u64;
    while let Some(request) = read_frame::<_, Request<'static>>(&mut reader)? {
        tracing::trace!(id = request.id, function = %request.function, "request");

        let result = registry.call(&request.function, &request.arguments);
        let response = Response {
            id: request.id,
            outcome: result.into(),
        };
        write_frame(&mut writer, &response)?;
        served += 1;
    }

    tracing::debug!(served, "worker input closed");
    Ok(served)
}

/// Serve requests over this process's stdin/stdout
pub fn run_stdio(registry: &Registry) -> Result<u64> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve(registry, stdin.lock(), stdout.lock())
}
