//! Records the wire conversation between the doctor and the gateway.
//!
//! Tracing is enabled by setting the environment variable IBGW_DOCTOR_TRACE_DIR
//! to the directory where the exchanged messages should be stored, e.g. /tmp/trace
//! /tmp/trace/0001-request.msg
//! /tmp/trace/0002-response.msg
//!
//! The recorded files are pipe-delimited so they can be pasted straight into
//! scripted socket tests when reproducing a gateway quirk.

use std::env;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use time::macros::format_description;
use time::OffsetDateTime;

use crate::messages::{RequestMessage, ResponseMessage};

const TRACE_DIR_ENV: &str = "IBGW_DOCTOR_TRACE_DIR";

static TRACE_SEQ: AtomicUsize = AtomicUsize::new(0);
static TRACER_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Clone, Debug)]
pub(crate) struct MessageRecorder {
    enabled: bool,
    trace_dir: String,
}

impl MessageRecorder {
    pub fn new(enabled: bool, trace_dir: String) -> Self {
        Self { enabled, trace_dir }
    }

    pub fn from_env() -> Self {
        match env::var(TRACE_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => {
                let format = format_description!("[year]-[month]-[day]-[hour]-[minute]");
                let now = OffsetDateTime::now_utc();
                let instance_id = TRACER_ID.fetch_add(1, Ordering::SeqCst);
                let trace_dir = format!("{}/{}-{}", dir, now.format(&format).unwrap(), instance_id);

                fs::create_dir_all(&trace_dir).unwrap();

                MessageRecorder::new(true, trace_dir)
            }
            _ => MessageRecorder {
                enabled: false,
                trace_dir: String::from(""),
            },
        }
    }

    pub fn record_request(&self, message: &RequestMessage) {
        if !self.enabled {
            return;
        }

        let record_id = TRACE_SEQ.fetch_add(1, Ordering::SeqCst);
        fs::write(self.request_file(record_id), message.encode().replace('\0', "|")).unwrap();
    }

    pub fn record_response(&self, message: &ResponseMessage) {
        if !self.enabled {
            return;
        }

        let record_id = TRACE_SEQ.fetch_add(1, Ordering::SeqCst);
        fs::write(self.response_file(record_id), message.encode().replace('\0', "|")).unwrap();
    }

    fn request_file(&self, record_id: usize) -> String {
        format!("{}/{:04}-request.msg", self.trace_dir, record_id)
    }

    fn response_file(&self, record_id: usize) -> String {
        format!("{}/{:04}-response.msg", self.trace_dir, record_id)
    }
}
