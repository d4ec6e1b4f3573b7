//! Spool output.
//!
//! Every statement the engine runs or skips is recorded as an entry:
//!
//! ```text
//! ### 2024-05-25 13:45:33 ###
//! # UPDATE  orders
//! #    SET  status = $1
//! #  WHERE  id = $2
//! # args: ['shipped', 7]
//! ```

use chrono::{Local, NaiveDateTime};
use gridsql_core::BoundParam;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

pub(crate) const CANCEL_PREFIX: &str = "(cancel) ";

/// Writes audit entries to an optional spool sink
pub struct AuditLog {
    spool: Option<Box<dyn Write + Send>>,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            spool: None,
            clock: local_now,
        }
    }

    /// Use `clock` for entry headers
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the spool sink, flushing the previous one
    pub fn set_spool(&mut self, spool: Option<Box<dyn Write + Send>>) -> io::Result<()> {
        if let Some(mut old) = self.spool.take() {
            old.flush()?;
        }
        self.spool = spool;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.spool.is_some()
    }

    /// Record a statement about to run
    pub fn log_statement(&mut self, sql: &str, params: &[BoundParam]) -> io::Result<()> {
        self.entry(sql, params, "")
    }

    /// Record a statement the operator skipped
    pub fn log_cancelled(&mut self, sql: &str, params: &[BoundParam]) -> io::Result<()> {
        self.entry(sql, params, CANCEL_PREFIX)
    }

    /// Record a failure of the preceding entry
    pub fn log_error(&mut self, error: &dyn std::fmt::Display) -> io::Result<()> {
        let Some(spool) = self.spool.as_mut() else {
            return Ok(());
        };
        for line in error.to_string().lines() {
            writeln!(spool, "# (error) {}", line)?;
        }
        spool.flush()
    }

    /// Copy free text, such as a rendered result, to the spool
    pub fn echo(&mut self, text: &str) -> io::Result<()> {
        let Some(spool) = self.spool.as_mut() else {
            return Ok(());
        };
        spool.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            spool.write_all(b"\n")?;
        }
        spool.flush()
    }

    fn entry(&mut self, sql: &str, params: &[BoundParam], prefix: &str) -> io::Result<()> {
        let now = (self.clock)();
        let Some(spool) = self.spool.as_mut() else {
            return Ok(());
        };
        writeln!(spool, "### {} ###", now.format("%Y-%m-%d %H:%M:%S"))?;
        for line in sql.lines() {
            writeln!(spool, "# {}{}", prefix, line)?;
        }
        if !params.is_empty() {
            let args: Vec<String> = params.iter().map(ToString::to_string).collect();
            writeln!(spool, "# args: [{}]", args.join(", "))?;
        }
        spool.flush()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts LF to CRLF, leaving existing CRLF pairs alone
pub struct CrlfWriter<W: Write> {
    inner: W,
    last: u8,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, last: 0 }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = Vec::with_capacity(buf.len() + buf.len() / 16 + 1);
        for &b in buf {
            if b == b'\n' && self.last != b'\r' {
                out.push(b'\r');
            }
            out.push(b);
            self.last = b;
        }
        self.inner.write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Open `path` for appending spool output
pub fn open_spool(path: &Path) -> io::Result<Box<dyn Write + Send>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing::info!(path = %path.display(), "spooling");
    Ok(Box::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gridsql_core::Value;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    /// Spool sink the test can read back
    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 25)
            .unwrap()
            .and_hms_opt(13, 45, 33)
            .unwrap()
    }

    #[test]
    fn test_entry_format() {
        let sink = Shared::default();
        let mut log = AuditLog::new().with_clock(fixed_clock);
        log.set_spool(Some(Box::new(sink.clone()))).unwrap();

        let params = vec![
            BoundParam::Named {
                name: "v1".into(),
                value: Value::String("FOO".into()),
            },
            BoundParam::Named {
                name: "v2".into(),
                value: Value::Int64(3),
            },
        ];
        log.log_statement("UPDATE  t\n   SET  a = $v1\n WHERE  id = $v2", &params)
            .unwrap();
        log.log_cancelled("DELETE FROM t\n WHERE  id = 4", &[]).unwrap();
        log.log_error(&"no rows affected").unwrap();

        assert_eq!(
            sink.text(),
            "### 2024-05-25 13:45:33 ###\n\
             # UPDATE  t\n\
             #    SET  a = $v1\n\
             #  WHERE  id = $v2\n\
             # args: [v1='FOO', v2=3]\n\
             ### 2024-05-25 13:45:33 ###\n\
             # (cancel) DELETE FROM t\n\
             # (cancel)  WHERE  id = 4\n\
             # (error) no rows affected\n"
        );
    }

    #[test]
    fn test_inactive_log_writes_nothing() {
        let mut log = AuditLog::new();
        assert!(!log.is_active());
        log.log_statement("SELECT 1", &[]).unwrap();
        log.echo("rows").unwrap();
    }

    #[test]
    fn test_crlf_writer() {
        let mut w = CrlfWriter::new(Vec::new());
        w.write_all(b"a\nb\r\nc").unwrap();
        w.write_all(b"\r").unwrap();
        w.write_all(b"\nd\n").unwrap();
        assert_eq!(w.into_inner(), b"a\r\nb\r\nc\r\nd\r\n".to_vec());
    }

    #[test]
    fn test_open_spool_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        std::fs::write(&path, "first\n").unwrap();

        let mut log = AuditLog::new().with_clock(fixed_clock);
        let spool = CrlfWriter::new(open_spool(&path).unwrap());
        log.set_spool(Some(Box::new(spool))).unwrap();
        log.log_statement("COMMIT", &[]).unwrap();
        log.set_spool(None).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "first\n### 2024-05-25 13:45:33 ###\r\n# COMMIT\r\n");
    }
}
