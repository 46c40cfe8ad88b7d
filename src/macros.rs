/// Prints an operator-facing line to stdout, prefixed with the local wall clock time.
/// Given a start time as the first argument it also prints the runtime since then.
/// ```ignore
/// info_time!("Row {}: {}", 1, "cats");
/// let started = chrono::Local::now();
/// info_time!(started, "Finished {} rows", 9);
/// ```
#[macro_export]
macro_rules! info_time {
    ($strfm:literal $(,)? $($arg:expr),*) => {{
        let now = ::chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        println!("{} - {}", now, format!($strfm, $($arg),*));
    }};
    ($time:expr, $strfm:literal $(,)? $($arg:expr),*) => {{
        let local_now = ::chrono::Local::now();
        let runtime = (local_now - $time)
            .to_std()
            .map($crate::stats::fmt_hms)
            .unwrap_or_else(|_| "0:00:00".to_string());
        println!(
            "{} - {} (runtime {})",
            local_now.format("%Y-%m-%d %H:%M:%S"),
            format!($strfm, $($arg),*),
            runtime
        );
    }};
}
