#![deny(clippy::all)]

//! Hand tracking for engines that consume per-joint hand skeletons from an Ultraleap style
//! sensor. Raw samples come in through a [`leap::TrackingSource`], get converted into
//! [`HandFrame`]s and are delivered to a consumer's [`ControllerRegistry`].

pub mod connection;
pub mod convert;
pub mod converter;
pub mod lifecycle;
pub mod pose;
pub mod profile;
pub mod provider;
pub mod skeleton;

pub use connection::{ConnectionMonitor, ConnectionStatus};
pub use converter::{
    ConvertError, ConverterOptions, HandFrame, HandPoseConverter, JointSpace, PointerSource,
    ReferenceFrame, TrackingState,
};
pub use lifecycle::{
    ControllerRegistry, HandLifecycleTracker, HandReport, IdChangePolicy, Observation,
    ObserveReport, RegistryError,
};
pub use pose::Pose;
pub use profile::{
    DeviceOffset, DeviceOffsetMode, FrameOptimizationMode, OperationMode, ProfileError,
    ProviderProfile,
};
pub use provider::HandTrackingProvider;
pub use skeleton::{Hand, HandJoint, JOINT_COUNT};

macro_rules! warn_once {
    ($literal:literal $(,$($tt:tt)*)?) => {{
        static ONCE: std::sync::Once = std::sync::Once::new();
        ONCE.call_once(|| {
            log::warn!(concat!("[ONCE] ", $literal) $(,$($tt)*)?);
        });
    }}
}
use warn_once;

#[cfg(feature = "tracing")]
macro_rules! tracy_span {
    ($($tt:tt)*) => {
        let _span = tracy_client::span!($($tt)*);
    }
}

#[cfg(not(feature = "tracing"))]
macro_rules! tracy_span {
    ($($tt:tt)*) => {};
}
use tracy_span;

#[cfg(feature = "tracing")]
tracy_client::register_demangler!();

/// Sends log output to the log file and to stderr.
struct ComboWriter<F, E>(F, E);

impl<F: std::io::Write, E: std::io::Write> std::io::Write for ComboWriter<F, E> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write_all(buf)?;
        self.1.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()?;
        self.1.flush()
    }
}

/// Sets up `env_logger` for hosts that don't install a logger of their own. Logs at info
/// by default (`RUST_LOG` overrides) and also goes to
/// `$XDG_STATE_HOME/handbridge/handbridge.txt`. Does nothing if a logger is already set.
pub fn init_logging() {
    static ONCE: std::sync::Once = std::sync::Once::new();

    ONCE.call_once(|| {
        let mut builder = env_logger::Builder::new();
        #[allow(unused_mut)]
        let mut startup_err: Option<String> = None;

        #[cfg(not(test))]
        {
            use std::path::Path;

            let state_dir = std::env::var("XDG_STATE_HOME")
                .or_else(|_| std::env::var("HOME").map(|h| h + "/.local/state"));

            if let Ok(state) = state_dir {
                let path = Path::new(&state).join("handbridge");
                match std::fs::create_dir_all(&path) {
                    Ok(()) => match std::fs::File::create(path.join("handbridge.txt")) {
                        Ok(file) => {
                            let writer = ComboWriter(file, std::io::stderr());
                            builder.target(env_logger::Target::Pipe(Box::new(writer)));
                        }
                        Err(e) => startup_err = Some(format!("Failed to create log file: {e:?}")),
                    },
                    Err(e) => {
                        startup_err =
                            Some(format!("Failed to create log directory ({path:?}): {e:?}"))
                    }
                }
            }
        }

        let result = builder
            .filter_level(log::LevelFilter::Info)
            .parse_default_env()
            .is_test(cfg!(test))
            .format(|buf, record| {
                use std::io::Write;
                use time::macros::format_description;

                let style = buf.default_level_style(record.level());
                let now = time::OffsetDateTime::now_local()
                    .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
                    .format(format_description!(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
                    ))
                    .map_err(std::io::Error::other)?;

                write!(buf, "[{now} {style}{:5}{style:#}", record.level())?;
                if let Some(path) = record.module_path() {
                    write!(buf, " {}", path)?;
                }
                writeln!(buf, " {:?}] {}", std::thread::current().id(), record.args())
            })
            .try_init();

        if result.is_err() {
            return;
        }
        log::info!("Initializing handbridge {}", env!("CARGO_PKG_VERSION"));
        if let Some(err) = startup_err {
            log::warn!("{err}");
        }
    });
}
