use async_trait::async_trait;
use jonas_diagnostics::config::DiagnosticsConfig;
use jonas_diagnostics::sampler::STATIC_COMMAND;
use jonas_diagnostics::{
    select_focused_process, CommandExecutor, DiagnosticsError, DiagnosticsSampler, GistOptions,
    GistReference, GistReporter,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const PS_OUTPUT: &str = "\
Thu Sep 12 17:37:24 UTC 2013
UID PID PPID C SZ RSS PSR STIME TTY TIME CMD
root 1 0 0 248 296 3 17:37 ? 00:00:00 wshd: 17644ia17he
vcap 23 1 0 4431 1464 0 17:37 ? 00:00:00 /bin/bash
vcap 25 23 0 4432 748 1 17:37 ? 00:00:00 /bin/bash
vcap 26 25 0 4431 628 0 17:37 ? 00:00:00 /bin/bash
vcap 28 26 0 1020 308 3 17:37 ? 00:00:00 tee /home/vcap/logs/stdout.log
vcap 27 25 0 4431 644 2 17:37 ? 00:00:00 /bin/bash
vcap 30 27 0 1020 308 0 17:37 ? 00:00:00 tee /home/vcap/logs/stderr.log
vcap 32 25 0 4432 612 3 17:37 ? 00:00:00 /bin/bash
vcap 37 32 0 2359542 60552 3 17:37 ? 00:00:00 .java/bin/java -jar .jonas_root/deployme/deployme.jar -topologyFile=.jonas_root/deployme/topology.xml -domainName=singleDomain -serverName=singleServerName
vcap 36 32 0 2359542 31552 3 17:37 ? 00:00:00 .java/bin/java -jar .jonas_root/deployme/deployme.jar -topologyFile=.jonas_root/deployme/topology.xml -domainName=singleDomain -serverName=singleServerName
vcap 31 1 0 15097 11048 0 17:37 ? 00:00:00 .jonas_root/diagnostics/jonas-diagnostics
vcap 55 31 0 1039 572 3 17:37 ? 00:00:00 sh -c date;vmstat;ps -AFH --cols=2000;free
vcap 59 55 0 3758 1040 3 17:37 ? 00:00:00 ps -AFH --cols=2000
";

const STATUS_OUTPUT: &str = "\
Name: java
State:  S (sleeping)
Tgid: 10461
Pid:  10461
PPid: 10460
VmRSS:      5748 kB
Threads:  1
";

/// Executor answering from a table and recording every command
#[derive(Default)]
struct ScriptedExecutor {
    outputs: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    fn with(mut self, command: &str, output: &str) -> Self {
        self.outputs.insert(command.to_string(), output.to_string());
        self
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, command: &str) -> String {
        self.calls.lock().unwrap().push(command.to_string());
        self.outputs
            .get(command)
            .cloned()
            .unwrap_or_else(|| format!("sh: {command}: not found\n"))
    }
}

/// Reporter keeping every posted content in memory
#[derive(Default)]
struct RecordingReporter {
    created: Mutex<Vec<String>>,
    updates: Mutex<Vec<(String, String)>>,
    update_attempts: AtomicUsize,
    fail_create: bool,
    fail_every_other_update: bool,
}

#[async_trait]
impl GistReporter for RecordingReporter {
    async fn create(
        &self,
        content: &str,
        _options: &GistOptions,
    ) -> jonas_diagnostics::Result<GistReference> {
        if self.fail_create {
            return Err(DiagnosticsError::GistApi {
                status: 401,
                body: "Bad credentials".to_string(),
            });
        }
        self.created.lock().unwrap().push(content.to_string());
        Ok(GistReference {
            url: "api_url".to_string(),
            html_url: "https://gist.example.com/1".to_string(),
        })
    }

    async fn update(
        &self,
        reference: &GistReference,
        content: &str,
        _options: &GistOptions,
    ) -> jonas_diagnostics::Result<()> {
        let attempt = self.update_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_every_other_update && attempt % 2 == 1 {
            return Err(DiagnosticsError::GistApi {
                status: 502,
                body: "Bad gateway".to_string(),
            });
        }
        self.updates
            .lock()
            .unwrap()
            .push((reference.url.clone(), content.to_string()));
        Ok(())
    }
}

fn enabled_config() -> DiagnosticsConfig {
    DiagnosticsConfig {
        enabled: true,
        ..DiagnosticsConfig::default()
    }
}

fn reference() -> GistReference {
    GistReference {
        url: "api_url".to_string(),
        html_url: "https://gist.example.com/1".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[test]
fn selects_largest_vcap_process_from_ps_output() {
    let focused = select_focused_process(PS_OUTPUT, "vcap").expect("focused process");
    assert_eq!(focused.pid, "37");
    assert_eq!(focused.rss, 60552);
}

#[test]
fn selects_among_three_candidates() {
    let listing = "\
vcap 23 1 0 4431 1464 0 17:37 ? 00:00:00 /bin/bash
vcap 25 23 0 4432 748 1 17:37 ? 00:00:00 /bin/bash
vcap 37 32 0 2359542 60552 3 17:37 ? 00:00:00 java
";
    assert_eq!(
        select_focused_process(listing, "vcap").expect("focused").pid,
        "37"
    );
}

#[test]
fn no_qualifying_lines_yields_none() {
    let listing = "root 1 0 0 248 296 3 17:37 ? 00:00:00 wshd\n";
    assert!(select_focused_process(listing, "vcap").is_none());
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn samples_listing_and_largest_process() {
    let executor = ScriptedExecutor::default()
        .with("date;ps -AFH --cols=2000", PS_OUTPUT)
        .with("cat /proc/37/status", STATUS_OUTPUT);
    let reporter = RecordingReporter::default();
    let sampler = DiagnosticsSampler::new(enabled_config(), executor, reporter);

    sampler
        .sample_and_post(&reference(), 1, Duration::from_secs(10))
        .await
        .expect("sample_and_post");

    let expected = format!(
        "Sample 1, elapsed 10 seconds\ndate;ps -AFH --cols=2000:\n{PS_OUTPUT}\n\ncat /proc/37/status:\n{STATUS_OUTPUT}\n"
    );
    assert_eq!(
        sampler_updates(&sampler),
        vec![("api_url".to_string(), expected)]
    );
    assert_eq!(
        *sampler.executor().calls.lock().unwrap(),
        vec![
            "date;ps -AFH --cols=2000".to_string(),
            "cat /proc/37/status".to_string()
        ]
    );
}

#[tokio::test]
async fn reports_missing_user_process() {
    let executor = ScriptedExecutor::default().with("date;ps -AFH --cols=2000", "UID PID\n");
    let sampler = DiagnosticsSampler::new(enabled_config(), executor, RecordingReporter::default());

    let record = sampler.sample(0, Duration::ZERO).await;

    assert!(record.detail.is_none());
    assert!(record.render().ends_with("no process owned by vcap found\n"));
}

#[tokio::test]
async fn init_posts_static_snapshot() {
    let executor = ScriptedExecutor::default().with(STATIC_COMMAND, "Mem: 1024\n");
    let sampler = DiagnosticsSampler::new(enabled_config(), executor, RecordingReporter::default());

    let reference = sampler.init().await.expect("init");

    assert_eq!(reference.html_url, "https://gist.example.com/1");
    let created = sampler_created(&sampler);
    assert_eq!(created.len(), 1);
    assert!(created[0].starts_with("Started "));
    assert!(created[0].ends_with(
        "tracing with cmd date;ps -AFH --cols=2000 followed by cat /proc/%{largest_process_pid}/status \
         \nAlso cgget -r cpuset.cpus -r memory.limit_in_bytes; free returns:\nMem: 1024\n"
    ));
}

#[tokio::test]
async fn init_failure_stops_the_sidecar() {
    let reporter = RecordingReporter {
        fail_create: true,
        ..RecordingReporter::default()
    };
    let sampler = DiagnosticsSampler::new(enabled_config(), ScriptedExecutor::default(), reporter);

    let err = sampler.run().await.expect_err("run must stop when init fails");
    assert!(matches!(err, DiagnosticsError::Init(_)));
}

#[tokio::test(start_paused = true)]
async fn loop_survives_failed_updates() {
    let executor = ScriptedExecutor::default()
        .with("date;ps -AFH --cols=2000", PS_OUTPUT)
        .with("cat /proc/37/status", STATUS_OUTPUT);
    let reporter = RecordingReporter {
        fail_every_other_update: true,
        ..RecordingReporter::default()
    };
    let sampler = DiagnosticsSampler::new(enabled_config(), executor, reporter);

    let outcome = tokio::time::timeout(Duration::from_millis(5500), sampler.run()).await;
    assert!(outcome.is_err(), "run never returns on its own");

    let updates = sampler_updates(&sampler);
    assert!(updates.len() >= 3, "got {} successful updates", updates.len());
    assert!(updates[0].1.starts_with("Sample 0, elapsed 0 seconds\n"));
    assert!(updates[1].1.starts_with("Sample 2, elapsed 2 seconds\n"));
}

// ---------------------------------------------------------------------------
// Helpers reaching into the fakes held by the sampler
// ---------------------------------------------------------------------------

fn sampler_updates(
    sampler: &DiagnosticsSampler<ScriptedExecutor, RecordingReporter>,
) -> Vec<(String, String)> {
    sampler.reporter().updates.lock().unwrap().clone()
}

fn sampler_created(
    sampler: &DiagnosticsSampler<ScriptedExecutor, RecordingReporter>,
) -> Vec<String> {
    sampler.reporter().created.lock().unwrap().clone()
}
