#![allow(unused_macros)]
//! Agent diagnostics.
//!
//! `graphdat_debug!`, `graphdat_info!`, `graphdat_warn!` and `graphdat_error!`
//! emit `tracing` events targeted at this crate when the `internal-logs`
//! feature is on. The agent never installs a subscriber; the host decides
//! where the events go. Under `cfg(test)` they also print to stdout, which
//! shows up with `--nocapture`.
//!
//! Every macro takes an event `name` followed by optional `key = value`
//! attributes:
//!
//! ```ignore
//! graphdat_warn!(name: "Pipeline.SampleDroppingStarted", capacity = 100);
//! ```

macro_rules! graphdat_event {
    ($level:ident, $name:expr $(, $key:ident = $value:expr)*) => {{
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::$level!(
                name: $name,
                target: env!("CARGO_PKG_NAME"),
                name = $name
                $(, $key = $value)*
            );
        }

        #[cfg(test)]
        {
            print!("graphdat_{}: name={}", stringify!($level), $name);
            $(
                print!(", {}={}", stringify!($key), $value);
            )*
            print!("\n");
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = ($name $(, $value)*); // optimized out
        }
    }};
}

macro_rules! graphdat_debug {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        graphdat_event!(debug, $name $(, $key = $value)*)
    };
}

macro_rules! graphdat_info {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        graphdat_event!(info, $name $(, $key = $value)*)
    };
}

macro_rules! graphdat_warn {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        graphdat_event!(warn, $name $(, $key = $value)*)
    };
}

macro_rules! graphdat_error {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        graphdat_event!(error, $name $(, $key = $value)*)
    };
}
