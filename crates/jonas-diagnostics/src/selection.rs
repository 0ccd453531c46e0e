//! Focused-process selection over a `ps -AFH` listing
//!
//! Columns: `UID PID PPID C SZ RSS PSR STIME TTY TIME CMD`.

const USER_COLUMN: usize = 0;
const PID_COLUMN: usize = 1;
const RSS_COLUMN: usize = 5;

/// The process with the largest resident set owned by the runtime user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusedProcess {
    pub pid: String,
    /// Resident set size in kilobytes
    pub rss: u64,
}

/// Select the line owned by `user` with the strictly largest RSS.
///
/// Ties keep the earliest line. Lines whose RSS does not parse are skipped.
pub fn select_focused_process(listing: &str, user: &str) -> Option<FocusedProcess> {
    let mut focused: Option<FocusedProcess> = None;

    for line in listing.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.get(USER_COLUMN) != Some(&user) {
            continue;
        }
        let (Some(pid), Some(rss)) = (fields.get(PID_COLUMN), fields.get(RSS_COLUMN)) else {
            continue;
        };
        let Ok(rss) = rss.parse::<u64>() else {
            continue;
        };

        if focused.as_ref().map_or(true, |current| rss > current.rss) {
            focused = Some(FocusedProcess {
                pid: pid.to_string(),
                rss,
            });
        }
    }

    focused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selects_largest_rss() {
        let listing = "\
UID PID PPID C SZ RSS PSR STIME TTY TIME CMD
vcap 23 1 0 4431 1464 0 17:37 ? 00:00:00 /bin/bash
vcap 25 23 0 4432 748 1 17:37 ? 00:00:00 /bin/bash
vcap 37 32 0 2359542 60552 3 17:37 ? 00:00:00 java -jar deployme.jar
";
        let focused = select_focused_process(listing, "vcap").unwrap();
        assert_eq!(focused, FocusedProcess { pid: "37".to_string(), rss: 60552 });
    }

    #[test]
    fn test_ties_keep_first() {
        let listing = "vcap 10 1 0 1 500 0 x ? x a\nvcap 11 1 0 1 500 0 x ? x b\n";
        assert_eq!(select_focused_process(listing, "vcap").unwrap().pid, "10");
    }

    #[test]
    fn test_user_must_match_exactly() {
        let listing = "root 1 0 0 248 99999 3 17:37 ? 00:00:00 init\nvcapx 2 1 0 1 50000 0 x ? x y\n";
        assert!(select_focused_process(listing, "vcap").is_none());
    }

    #[test]
    fn test_unparseable_rss_skipped_and_zero_selectable() {
        let listing = "vcap 5 1 0 1 n/a 0 x ? x a\nvcap 6 1 0 1 0 0 x ? x b\n";
        let focused = select_focused_process(listing, "vcap").unwrap();
        assert_eq!(focused.pid, "6");
        assert_eq!(focused.rss, 0);
    }

    #[test]
    fn test_empty_listing() {
        assert!(select_focused_process("", "vcap").is_none());
    }
}
