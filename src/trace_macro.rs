#[cfg(feature = "trace")]
macro_rules! atombuf_trace {
    ($($arg:tt)*) => {
        ::tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "trace"))]
macro_rules! atombuf_trace {
    ($($arg:tt)*) => {};
}
