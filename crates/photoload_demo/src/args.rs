use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use photoload::url::Url;
use photoload::PrefetchBehavior;
use tracing::error;

const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Args {
    pub urls: Vec<Url>,
    pub config: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub prefetch: Option<PrefetchBehavior>,
    pub start: usize,
    pub raw: bool,
    pub page_timeout: Duration,
}

fn parse_prefetch(s: &str) -> Option<PrefetchBehavior> {
    match s {
        "conservative" => Some(PrefetchBehavior::Conservative),
        "regular" => Some(PrefetchBehavior::Regular),
        "aggressive" => Some(PrefetchBehavior::Aggressive),
        _ => None,
    }
}

impl Args {
    // parse arguments, return set of unrecognized args
    pub fn parse(args: &[String]) -> (Self, BTreeSet<String>) {
        let mut unrecognized_args = BTreeSet::new();
        let mut res = Args {
            urls: vec![],
            config: None,
            log_dir: None,
            prefetch: None,
            start: 0,
            raw: false,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        };

        let mut i = 0;
        let len = args.len();
        while i < len {
            let arg = &args[i];

            if arg == "--config" {
                i += 1;
                let Some(path) = args.get(i) else {
                    error!("config argument missing?");
                    continue;
                };
                res.config = Some(PathBuf::from(path));
            } else if arg == "--log-dir" {
                i += 1;
                let Some(path) = args.get(i) else {
                    error!("log-dir argument missing?");
                    continue;
                };
                res.log_dir = Some(PathBuf::from(path));
            } else if arg == "--prefetch" {
                i += 1;
                match args.get(i).map(|s| (s, parse_prefetch(s))) {
                    Some((_, Some(prefetch))) => res.prefetch = Some(prefetch),
                    Some((value, None)) => error!(
                        "unknown prefetch behavior '{value}', expected conservative, regular or aggressive"
                    ),
                    None => error!("prefetch argument missing?"),
                }
            } else if arg == "--start" {
                i += 1;
                match args.get(i).map(|s| s.parse::<usize>()) {
                    Some(Ok(start)) => res.start = start,
                    Some(Err(err)) => error!("failed to parse start index: {err}"),
                    None => error!("start argument missing?"),
                }
            } else if arg == "--timeout" {
                i += 1;
                match args.get(i).map(|s| s.parse::<u64>()) {
                    Some(Ok(secs)) => res.page_timeout = Duration::from_secs(secs),
                    Some(Err(err)) => error!("failed to parse timeout: {err}"),
                    None => error!("timeout argument missing?"),
                }
            } else if arg == "--raw" {
                res.raw = true;
            } else if arg.starts_with("--") {
                unrecognized_args.insert(arg.clone());
            } else if let Ok(url) = Url::parse(arg) {
                res.urls.push(url);
            } else {
                error!("'{arg}' is not a valid URL, skipping");
                unrecognized_args.insert(arg.clone());
            }

            i += 1;
        }

        (res, unrecognized_args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> (Args, BTreeSet<String>) {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Args::parse(&args)
    }

    #[test]
    fn parses_options_and_urls() {
        let (args, unrecognized) = parse(&[
            "--prefetch",
            "aggressive",
            "https://x/0.gif",
            "--start",
            "1",
            "--raw",
            "https://x/1.jpg",
            "--timeout",
            "5",
        ]);

        assert!(unrecognized.is_empty());
        assert_eq!(args.urls.len(), 2);
        assert_eq!(args.prefetch, Some(PrefetchBehavior::Aggressive));
        assert_eq!(args.start, 1);
        assert!(args.raw);
        assert_eq!(args.page_timeout, Duration::from_secs(5));
    }

    #[test]
    fn collects_unrecognized() {
        let (args, unrecognized) = parse(&["--frobnicate", "not a url", "--config", "a.json"]);
        assert!(args.urls.is_empty());
        assert_eq!(args.config, Some(PathBuf::from("a.json")));
        assert!(unrecognized.contains("--frobnicate"));
        assert!(unrecognized.contains("not a url"));
    }

    #[test]
    fn bad_values_keep_defaults() {
        let (args, _) = parse(&["--prefetch", "eager", "--start", "x"]);
        assert_eq!(args.prefetch, None);
        assert_eq!(args.start, 0);
        assert_eq!(args.page_timeout, DEFAULT_PAGE_TIMEOUT);
    }
}
