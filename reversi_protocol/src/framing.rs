// Newline-terminated line transport.
//
// Protocol lines are ASCII, one per line, flushed immediately — the
// conversation is strictly request/response and a buffered half-line would
// stall the peer. `read_line` distinguishes an orderly peer close (Ok(None))
// from an I/O failure, and bounds line length so a misbehaving peer cannot
// force unbounded allocation.
//
// The session layer's `Connection` does its own incremental reads so it can
// interleave read-timeout polls with cancellation checks; these helpers are
// for plainly blocking streams (handshakes, tests, simple peers).

use std::io::{self, BufRead, Read, Write};

/// Longest line we accept. The longest legal line is a GAME_REQUEST with a
/// generous player name; anything past this is a misbehaving peer.
pub const MAX_LINE_LEN: usize = 512;

/// Write one protocol line, newline-terminated, and flush.
pub fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Read one protocol line, trimmed of its line terminator.
///
/// Returns `Ok(None)` on an orderly close before any bytes of a new line.
/// Returns `InvalidData` if the line exceeds [`MAX_LINE_LEN`]; the read
/// itself is capped, so an overlong line is rejected without ever being
/// buffered whole.
pub fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = String::new();
    let n = reader.take(MAX_LINE_LEN as u64 + 1).read_line(&mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    if n > MAX_LINE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line too long: {n} bytes (max {MAX_LINE_LEN})"),
        ));
    }
    Ok(Some(buf.trim_end_matches(['\r', '\n']).to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn roundtrip_single_line() {
        let mut buf = Vec::new();
        write_line(&mut buf, "START_GAME").unwrap();

        let mut cursor = Cursor::new(&buf);
        let line = read_line(&mut cursor).unwrap();
        assert_eq!(line.as_deref(), Some("START_GAME"));
    }

    #[test]
    fn multiple_lines_in_sequence() {
        let mut buf = Vec::new();
        for line in ["HELLO 1.0", "GET_MOVE", "END"] {
            write_line(&mut buf, line).unwrap();
        }

        let mut cursor = Cursor::new(&buf);
        assert_eq!(read_line(&mut cursor).unwrap().as_deref(), Some("HELLO 1.0"));
        assert_eq!(read_line(&mut cursor).unwrap().as_deref(), Some("GET_MOVE"));
        assert_eq!(read_line(&mut cursor).unwrap().as_deref(), Some("END"));
    }

    #[test]
    fn eof_returns_none() {
        let mut cursor = Cursor::new(Vec::new());
        assert_eq!(read_line(&mut cursor).unwrap(), None);
    }

    #[test]
    fn crlf_is_trimmed() {
        let mut cursor = Cursor::new(b"MOVE_CONFIRM\r\n".to_vec());
        let line = read_line(&mut cursor).unwrap();
        assert_eq!(line.as_deref(), Some("MOVE_CONFIRM"));
    }

    #[test]
    fn rejects_overlong_line() {
        let mut data = vec![b'X'; MAX_LINE_LEN + 10];
        data.push(b'\n');
        let mut cursor = Cursor::new(data);
        let err = read_line(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    /// The rejection must not require buffering the whole line first: a
    /// huge unterminated stream fails at the cap.
    #[test]
    fn rejects_unterminated_stream_at_the_cap() {
        let data = vec![b'X'; MAX_LINE_LEN * 64];
        let mut cursor = Cursor::new(data);
        let err = read_line(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        // Only the capped prefix was consumed.
        assert_eq!(cursor.position(), MAX_LINE_LEN as u64 + 1);
    }
}
