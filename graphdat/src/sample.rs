//! The per-request record shipped to the collector.
//!
//! A sample is encoded as a MessagePack map using the field names the
//! collector expects:
//!
//! ```text
//! {
//!   "type": "Sample",
//!   "source": "HTTP",
//!   "route": "GET /users/:id",
//!   "host": "www.example.com",
//!   "pid": 90904,
//!   "timestamp": 1353535694666.753,
//!   "responsetime": 49.414,
//!   "context": [
//!     { "name": "/", "callcount": 1, "firsttimestampoffset": 0.099, "responsetime": 49.414 },
//!     { "name": "/render", "callcount": 1, "firsttimestampoffset": 3.870, "responsetime": 45.502 }
//!   ]
//! }
//! ```
use crate::error::EncodeError;

/// Summary of one span of the request's timing tree.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanSummary {
    /// Full path of the span, e.g. `/render/header`.
    pub name: String,
    /// How many times the span was entered.
    pub call_count: u64,
    /// Milliseconds from the request start to the first time the span was entered.
    pub first_timestamp_offset_ms: f64,
    /// Accumulated milliseconds the span was active.
    pub response_time_ms: f64,
}

/// One completed request, ready for delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    route: String,
    host: String,
    pid: u32,
    timestamp: f64,
    response_time_ms: f64,
    context: Vec<SpanSummary>,
}

impl Sample {
    /// Value of the `source` field.
    pub const SOURCE: &'static str = "HTTP";
    /// Value of the `type` field.
    pub const TYPE: &'static str = "Sample";

    /// `context` must start with the root span, whose response time becomes
    /// the sample's.
    pub(crate) fn new(
        route: String,
        host: String,
        pid: u32,
        timestamp: f64,
        context: Vec<SpanSummary>,
    ) -> Self {
        let response_time_ms = context
            .first()
            .map(|root| root.response_time_ms)
            .unwrap_or_default();
        Sample {
            route,
            host,
            pid,
            timestamp,
            response_time_ms,
            context,
        }
    }

    /// `METHOD PATH`, with the path tokenized when a route pattern matched.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Request host without port.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Id of the instrumented process.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Request start in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Total time of the root span in milliseconds.
    pub fn response_time_ms(&self) -> f64 {
        self.response_time_ms
    }

    /// Span summaries in depth-first order, root first.
    pub fn context(&self) -> &[SpanSummary] {
        &self.context
    }

    /// Encodes the sample as a MessagePack map.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut encoded = Vec::with_capacity(128 + self.context.len() * 64);

        rmp::encode::write_map_len(&mut encoded, 8)?;

        rmp::encode::write_str(&mut encoded, "type")?;
        rmp::encode::write_str(&mut encoded, Self::TYPE)?;

        rmp::encode::write_str(&mut encoded, "source")?;
        rmp::encode::write_str(&mut encoded, Self::SOURCE)?;

        rmp::encode::write_str(&mut encoded, "route")?;
        rmp::encode::write_str(&mut encoded, &self.route)?;

        rmp::encode::write_str(&mut encoded, "host")?;
        rmp::encode::write_str(&mut encoded, &self.host)?;

        rmp::encode::write_str(&mut encoded, "pid")?;
        rmp::encode::write_uint(&mut encoded, u64::from(self.pid))?;

        rmp::encode::write_str(&mut encoded, "timestamp")?;
        rmp::encode::write_f64(&mut encoded, self.timestamp)?;

        rmp::encode::write_str(&mut encoded, "responsetime")?;
        rmp::encode::write_f64(&mut encoded, self.response_time_ms)?;

        rmp::encode::write_str(&mut encoded, "context")?;
        rmp::encode::write_array_len(&mut encoded, self.context.len() as u32)?;
        for span in &self.context {
            rmp::encode::write_map_len(&mut encoded, 4)?;

            rmp::encode::write_str(&mut encoded, "name")?;
            rmp::encode::write_str(&mut encoded, &span.name)?;

            rmp::encode::write_str(&mut encoded, "callcount")?;
            rmp::encode::write_uint(&mut encoded, span.call_count)?;

            rmp::encode::write_str(&mut encoded, "firsttimestampoffset")?;
            rmp::encode::write_f64(&mut encoded, span.first_timestamp_offset_ms)?;

            rmp::encode::write_str(&mut encoded, "responsetime")?;
            rmp::encode::write_f64(&mut encoded, span.response_time_ms)?;
        }

        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmp::decode;

    fn read_string(buf: &mut &[u8]) -> String {
        let len = decode::read_str_len(buf).unwrap() as usize;
        let (s, rest) = buf.split_at(len);
        *buf = rest;
        String::from_utf8(s.to_vec()).unwrap()
    }

    fn sample() -> Sample {
        Sample::new(
            "GET /users/:id".to_string(),
            "example.com".to_string(),
            4242,
            1_353_535_694_666.75,
            vec![
                SpanSummary {
                    name: "/".to_string(),
                    call_count: 1,
                    first_timestamp_offset_ms: 0.0,
                    response_time_ms: 49.5,
                },
                SpanSummary {
                    name: "/render".to_string(),
                    call_count: 2,
                    first_timestamp_offset_ms: 3.25,
                    response_time_ms: 45.5,
                },
            ],
        )
    }

    #[test]
    fn test_response_time_comes_from_root() {
        let sample = sample();
        assert_eq!(sample.response_time_ms(), 49.5);
        assert_eq!(sample.response_time_ms(), sample.context()[0].response_time_ms);
    }

    #[test]
    fn test_encode_writes_collector_fields() {
        let encoded = sample().encode().unwrap();
        let mut buf = encoded.as_slice();

        assert_eq!(decode::read_map_len(&mut buf).unwrap(), 8);

        assert_eq!(read_string(&mut buf), "type");
        assert_eq!(read_string(&mut buf), "Sample");
        assert_eq!(read_string(&mut buf), "source");
        assert_eq!(read_string(&mut buf), "HTTP");
        assert_eq!(read_string(&mut buf), "route");
        assert_eq!(read_string(&mut buf), "GET /users/:id");
        assert_eq!(read_string(&mut buf), "host");
        assert_eq!(read_string(&mut buf), "example.com");
        assert_eq!(read_string(&mut buf), "pid");
        assert_eq!(decode::read_int::<u64, _>(&mut buf).unwrap(), 4242);
        assert_eq!(read_string(&mut buf), "timestamp");
        assert_eq!(decode::read_f64(&mut buf).unwrap(), 1_353_535_694_666.75);
        assert_eq!(read_string(&mut buf), "responsetime");
        assert_eq!(decode::read_f64(&mut buf).unwrap(), 49.5);
        assert_eq!(read_string(&mut buf), "context");
        assert_eq!(decode::read_array_len(&mut buf).unwrap(), 2);

        assert_eq!(decode::read_map_len(&mut buf).unwrap(), 4);
        assert_eq!(read_string(&mut buf), "name");
        assert_eq!(read_string(&mut buf), "/");
        assert_eq!(read_string(&mut buf), "callcount");
        assert_eq!(decode::read_int::<u64, _>(&mut buf).unwrap(), 1);
        assert_eq!(read_string(&mut buf), "firsttimestampoffset");
        assert_eq!(decode::read_f64(&mut buf).unwrap(), 0.0);
        assert_eq!(read_string(&mut buf), "responsetime");
        assert_eq!(decode::read_f64(&mut buf).unwrap(), 49.5);

        assert_eq!(decode::read_map_len(&mut buf).unwrap(), 4);
        assert_eq!(read_string(&mut buf), "name");
        assert_eq!(read_string(&mut buf), "/render");
        assert_eq!(read_string(&mut buf), "callcount");
        assert_eq!(decode::read_int::<u64, _>(&mut buf).unwrap(), 2);

        // the second context entry's two floats remain
        assert_eq!(buf.len(), "firsttimestampoffset".len() + 1 + 9 + "responsetime".len() + 1 + 9);
    }
}
