//! Line framing and record parsing for the accelerometer stream
//!
//! Records look like `ASC3 <seq> <x> <y> <z>`; anything else is noise.

/// Partial lines longer than this are discarded
pub const MAX_LINE_LEN: usize = 1024;

/// Splits a byte stream into newline-terminated lines
///
/// Bytes after the last newline are held and prefixed to the next push.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and hand every completed line to `on_line`
    ///
    /// Invalid UTF-8 is replaced, trailing `\r` is stripped.
    pub fn push(&mut self, bytes: &[u8], mut on_line: impl FnMut(&str)) {
        let mut rest = bytes;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.pending.is_empty() {
                emit(head, &mut on_line);
            } else {
                self.pending.extend_from_slice(head);
                let line = std::mem::take(&mut self.pending);
                emit(&line, &mut on_line);
            }
        }

        self.pending.extend_from_slice(rest);
        if self.pending.len() > MAX_LINE_LEN {
            log::debug!(
                "Discarding {} bytes without line terminator",
                self.pending.len()
            );
            self.pending.clear();
        }
    }

    /// Bytes held waiting for a terminator
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn emit(raw: &[u8], on_line: &mut impl FnMut(&str)) {
    let text = String::from_utf8_lossy(raw);
    on_line(text.trim_end_matches('\r'));
}

/// Extract the (x, y, z) counts from a record
///
/// Valid when the line has at least five whitespace-separated tokens, the
/// first equals `tag`, and tokens 3 to 5 parse as integers.
pub fn parse_record(line: &str, tag: &str) -> Option<[i32; 3]> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != tag {
        return None;
    }
    let _seq = tokens.next()?;
    let x = tokens.next()?.parse().ok()?;
    let y = tokens.next()?.parse().ok()?;
    let z = tokens.next()?.parse().ok()?;
    Some([x, y, z])
}
