//! End-to-end convergence passes over recording fakes.

use std::fs;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use warden_engine::{
    Action, Artifact, ArtifactPaths, Collaborators, Engine, HostPort, Options, RelationSnapshot,
    ScrapeDocument, ServiceGroup, Status, Trigger, UnitInfo, PRIMARY_TEMPLATE, SECONDARY_TEMPLATE,
};
use warden_host::fake::{
    FakeDashboard, FakePackages, FakePorts, FakeRenderer, FakeServices, FakeValidator, PortCall,
    ServiceCall,
};
use warden_store::{FileKv, KvStore, MemoryKv};

const PRIMARY_BODY: &str = "\
# managed file
global:
  scrape_interval: {{ scrape_interval }}
  evaluation_interval: {{ evaluation_interval }}
  external_labels:
    monitor: {{ monitor_name }}
{{ rule_files }}
{{ scrape_configs }}";

const SECONDARY_BODY: &str = "ARGS=\"{{ args }}\"\n";

struct Harness {
    dir: TempDir,
    renderer: FakeRenderer,
    validator: FakeValidator,
    services: FakeServices,
    packages: FakePackages,
    ports: FakePorts,
    engine: Engine,
}

impl Harness {
    fn new(options: Options) -> Self {
        let dir = TempDir::new().unwrap();
        Self::over(dir, Box::new(MemoryKv::new()), options)
    }

    fn over(dir: TempDir, kv: Box<dyn KvStore>, options: Options) -> Self {
        let renderer = FakeRenderer::new();
        renderer.add_template(PRIMARY_TEMPLATE, PRIMARY_BODY);
        renderer.add_template(SECONDARY_TEMPLATE, SECONDARY_BODY);
        let validator = FakeValidator::new();
        let services = FakeServices::new();
        let packages = FakePackages::new();
        let ports = FakePorts::new();

        let engine = Engine::new(
            kv,
            options,
            UnitInfo::default(),
            ArtifactPaths::under(dir.path()),
            Collaborators {
                renderer: Box::new(renderer.clone()),
                validator: Box::new(validator.clone()),
                services: Box::new(services.clone()),
                packages: Box::new(packages.clone()),
                ports: Box::new(ports.clone()),
            },
        )
        .unwrap();

        Self {
            dir,
            renderer,
            validator,
            services,
            packages,
            ports,
            engine,
        }
    }

    fn converge(&mut self) -> Status {
        self.engine.run_pass(&Trigger::ConfigChanged).unwrap()
    }

    fn scrape_document(&self) -> ScrapeDocument {
        let text = fs::read_to_string(self.dir.path().join("prometheus.yml")).unwrap();
        serde_yaml::from_str(&text).unwrap()
    }

    fn defaults(&self) -> Option<String> {
        fs::read_to_string(self.dir.path().join("default_prometheus")).ok()
    }

    fn service_calls(&self) -> Vec<ServiceCall> {
        self.services.state().borrow().calls.clone()
    }
}

#[test]
fn first_pass_installs_configures_and_starts() {
    let mut h = Harness::new(Options::new());
    let status = h.converge();

    assert_eq!(status, Status::Active("Ready".into()));
    assert_eq!(
        h.packages.installs().borrow().clone(),
        vec![vec!["prometheus".to_string()]]
    );
    assert_eq!(h.ports.calls().borrow().clone(), vec![PortCall::Open(9090)]);
    assert_eq!(
        h.service_calls(),
        vec![ServiceCall::Start("prometheus".into())]
    );
    assert!(h.engine.pending().is_empty());

    let doc = h.scrape_document();
    assert_eq!(doc.scrape_configs.len(), 1);
    assert_eq!(doc.scrape_configs[0].job_name, "prometheus");
    assert_eq!(
        doc.scrape_configs[0].target_groups[0].targets,
        vec!["localhost:9090"]
    );
    assert!(doc.scrape_configs[0].target_groups[0].labels.is_empty());

    // No runtime flags configured, so the flags file is never created.
    assert_eq!(h.defaults(), None);
}

#[test]
fn repeated_pass_with_unchanged_inputs_is_a_noop() {
    let mut h = Harness::new(Options::new());
    h.converge();
    let status = h.engine.run_pass(&Trigger::UpdateStatus).unwrap();

    assert_eq!(status, Status::Active("Ready".into()));
    assert_eq!(h.packages.installs().borrow().len(), 1);
    assert_eq!(h.validator.call_count(), 1);
    assert_eq!(h.service_calls().len(), 1);
}

#[test]
fn restart_coalesces_to_one_bounce_per_pass() {
    // First pass regenerates both artifacts and still bounces once.
    let mut h = Harness::new(Options::from_pairs(&[(
        "external-url",
        json!("http://{public_address}:{port}/"),
    )]));
    h.converge();
    assert_eq!(h.service_calls().len(), 1);
}

#[test]
fn port_change_opens_new_then_closes_old() {
    let mut h = Harness::new(Options::new());
    h.converge();

    h.engine
        .set_options(Options::from_pairs(&[("port", json!(9091))]));
    h.converge();

    assert_eq!(
        h.ports.calls().borrow().clone(),
        vec![
            PortCall::Open(9090),
            PortCall::Open(9091),
            PortCall::Close(9090),
        ]
    );
    // Running service gets a restart, not a second start.
    assert_eq!(
        h.service_calls(),
        vec![
            ServiceCall::Start("prometheus".into()),
            ServiceCall::Restart("prometheus".into()),
        ]
    );
}

#[test]
fn static_targets_render_as_their_own_job() {
    let mut h = Harness::new(Options::from_pairs(&[(
        "static-targets",
        json!("foo:1234 , bar:5678"),
    )]));
    h.converge();

    let doc = h.scrape_document();
    let job = doc
        .scrape_configs
        .iter()
        .find(|j| j.job_name == "static-targets")
        .unwrap();
    assert_eq!(job.target_groups[0].targets, vec!["foo:1234", "bar:5678"]);
    assert_eq!(
        job.target_groups[0].labels.get("group").unwrap(),
        "promoagents-static"
    );
}

#[test]
fn target_peers_appear_and_depart() {
    let mut h = Harness::new(Options::new());
    let peers = RelationSnapshot::single("node-exporter", &[("h1", "9100"), ("h2", "9100")]);
    h.engine
        .run_pass(&Trigger::TargetsChanged { peers })
        .unwrap();

    let doc = h.scrape_document();
    let job = doc
        .scrape_configs
        .iter()
        .find(|j| j.job_name == "node-exporter")
        .unwrap();
    assert_eq!(job.target_groups[0].targets, vec!["h1:9100", "h2:9100"]);
    assert_eq!(
        job.target_groups[0].labels.get("group").unwrap(),
        "promoagents-juju"
    );

    h.engine.run_pass(&Trigger::TargetsDeparted).unwrap();
    let doc = h.scrape_document();
    assert!(doc.scrape_configs.iter().all(|j| j.job_name != "node-exporter"));
    // The self-scrape job always remains.
    assert_eq!(doc.scrape_configs[0].job_name, "prometheus");
}

#[test]
fn each_peer_service_renders_as_its_own_job() {
    let mut h = Harness::new(Options::new());
    let peers = RelationSnapshot {
        services: vec![
            ServiceGroup {
                service_name: "foo".into(),
                hosts: vec![
                    HostPort {
                        hostname: "foo-host-1".into(),
                        port: "9100".into(),
                    },
                    HostPort {
                        hostname: "foo-host-2".into(),
                        port: "9100".into(),
                    },
                ],
            },
            ServiceGroup {
                service_name: "bar".into(),
                hosts: vec![HostPort {
                    hostname: "bar-host".into(),
                    port: "9200".into(),
                }],
            },
        ],
    };
    h.engine
        .run_pass(&Trigger::TargetsChanged { peers })
        .unwrap();

    // One job per service, after the self-scrape job, in discovery order.
    let doc = h.scrape_document();
    let names: Vec<&str> = doc
        .scrape_configs
        .iter()
        .map(|j| j.job_name.as_str())
        .collect();
    assert_eq!(names, vec!["prometheus", "foo", "bar"]);

    let foo = &doc.scrape_configs[1];
    assert_eq!(
        foo.target_groups[0].targets,
        vec!["foo-host-1:9100", "foo-host-2:9100"]
    );
    let bar = &doc.scrape_configs[2];
    assert_eq!(bar.target_groups[0].targets, vec!["bar-host:9200"]);
    assert_eq!(
        bar.target_groups[0].labels.get("group").unwrap(),
        "promoagents-juju"
    );
}

#[test]
fn bare_scrape_targets_collapse_into_one_job() {
    let mut h = Harness::new(Options::new());
    let peers = RelationSnapshot::single("blackbox", &[("b1", "9115")]);
    h.engine
        .run_pass(&Trigger::ScrapeTargetsChanged { peers })
        .unwrap();

    let doc = h.scrape_document();
    let job = doc
        .scrape_configs
        .iter()
        .find(|j| j.job_name == "scrape-targets")
        .unwrap();
    assert_eq!(job.target_groups[0].targets, vec!["b1:9115"]);
    assert_eq!(
        job.target_groups[0].labels.get("group").unwrap(),
        "promoagents-scrape"
    );
}

#[test]
fn alertmanager_last_unit_wins_and_departs_cleanly() {
    let mut h = Harness::new(Options::new());
    let peers = RelationSnapshot::single("alertmanager", &[("am1", "9093"), ("am2", "9093")]);
    h.engine
        .run_pass(&Trigger::AlertmanagerChanged { peers })
        .unwrap();

    let defaults = h.defaults().unwrap();
    assert_eq!(defaults, "ARGS=\"-alertmanager.url http://am2:9093\"\n");

    h.engine.run_pass(&Trigger::AlertmanagerDeparted).unwrap();
    assert!(h.engine.facts().args_list().unwrap().is_empty());
}

#[test]
fn storage_location_becomes_a_runtime_flag() {
    let mut h = Harness::new(Options::new());
    h.engine
        .run_pass(&Trigger::StorageAttached {
            location: "/srv/metrics".into(),
        })
        .unwrap();

    assert_eq!(
        h.defaults().unwrap(),
        "ARGS=\"-storage.local.path /srv/metrics\"\n"
    );
    assert_eq!(
        h.engine.facts().storage_path().unwrap(),
        Some("/srv/metrics".into())
    );
}

#[test]
fn custom_rules_written_verbatim_and_referenced() {
    let rules = "ALERT InstanceDown\n  IF up == 0\n  FOR 5m\n";
    let mut h = Harness::new(Options::from_pairs(&[("custom-rules", json!(rules))]));
    h.converge();

    let written = fs::read_to_string(h.dir.path().join("custom.rules")).unwrap();
    assert_eq!(written, rules);

    let config = fs::read_to_string(h.dir.path().join("prometheus.yml")).unwrap();
    assert!(config.contains("rule_files:"));
    assert!(config.contains("custom.rules"));
}

#[test]
fn external_url_expands_declared_keys() {
    let mut h = Harness::new(Options::from_pairs(&[(
        "external-url",
        json!("http://{public_address}:{port}/prom"),
    )]));
    h.converge();

    assert_eq!(
        h.defaults().unwrap(),
        "ARGS=\"-web.external-url http://localhost:9090/prom\"\n"
    );
}

#[test]
fn malformed_external_url_blocks_and_recovers() {
    let mut h = Harness::new(Options::from_pairs(&[(
        "external-url",
        json!("http://{bogus}/"),
    )]));
    assert!(h.engine.run_pass(&Trigger::ConfigChanged).is_err());

    let status = h.engine.status().unwrap().unwrap();
    assert!(matches!(status, Status::Blocked(_)));
    assert!(status.message().starts_with("configuration error"));
    assert!(
        h.engine
            .pending()
            .is_pending(Action::Regenerate(Artifact::RuntimeDefaults))
    );
    // The service was never bounced on a failed pass.
    assert!(h.service_calls().is_empty());

    h.engine.set_options(Options::from_pairs(&[(
        "external-url",
        json!("http://{public_address}:{port}/"),
    )]));
    let status = h.converge();
    assert_eq!(status, Status::Active("Ready".into()));
    assert!(h.engine.pending().is_empty());
}

#[test]
fn validation_failure_keeps_flag_pending_and_skips_restart() {
    let mut h = Harness::new(Options::new());
    h.validator.fail_with("yaml: line 4: mapping values");

    assert!(h.engine.run_pass(&Trigger::ConfigChanged).is_err());
    assert!(
        h.engine
            .pending()
            .is_pending(Action::Regenerate(Artifact::ScrapeConfig))
    );
    assert!(h.service_calls().is_empty());

    // The persisted flag retries the generation even though no input
    // changed since.
    h.validator.pass();
    let status = h.engine.run_pass(&Trigger::UpdateStatus).unwrap();
    assert_eq!(status, Status::Active("Ready".into()));
    assert!(h.engine.pending().is_empty());
    assert_eq!(h.service_calls().len(), 1);
}

#[test]
fn shipped_template_change_regenerates() {
    let mut h = Harness::new(Options::new());
    h.converge();
    assert_eq!(h.validator.call_count(), 1);

    h.renderer.set_digest(PRIMARY_TEMPLATE, "v2");
    h.engine.run_pass(&Trigger::UpdateStatus).unwrap();

    assert_eq!(h.validator.call_count(), 2);
    assert_eq!(h.service_calls().len(), 2);
}

#[test]
fn install_option_change_reinstalls_packages() {
    let mut h = Harness::new(Options::new());
    h.converge();

    h.engine.set_options(Options::from_pairs(&[(
        "install_sources",
        json!("ppa:prometheus/stable"),
    )]));
    h.converge();

    assert_eq!(h.packages.installs().borrow().len(), 2);

    // A non-install option alone never reinstalls.
    h.engine.set_options(Options::from_pairs(&[
        ("install_sources", json!("ppa:prometheus/stable")),
        ("port", json!(9091)),
    ]));
    h.converge();

    assert_eq!(h.packages.installs().borrow().len(), 2);
}

#[test]
fn boolean_false_external_url_is_ignored() {
    // Option schemas ship `false` as the unset default for the URL
    // format; it must not leak into the daemon flags as text.
    let mut h = Harness::new(Options::from_pairs(&[("external-url", json!(false))]));
    let status = h.converge();

    assert_eq!(status, Status::Active("Ready".into()));
    assert_eq!(h.defaults(), None);
    assert!(h.engine.facts().args_list().unwrap().is_empty());
}

#[test]
fn pending_actions_survive_process_restart() {
    let dir = TempDir::new().unwrap();
    let kv_path = dir.path().join("facts.json");

    let mut h = Harness::over(
        dir,
        Box::new(FileKv::open(&kv_path).unwrap()),
        Options::new(),
    );
    h.validator.fail_with("bad config");
    assert!(h.engine.run_pass(&Trigger::ConfigChanged).is_err());
    let dir = h.dir;

    // A fresh engine over the same store sees the unfinished work.
    let h = Harness::over(
        dir,
        Box::new(FileKv::open(&kv_path).unwrap()),
        Options::new(),
    );
    assert!(
        h.engine
            .pending()
            .is_pending(Action::Regenerate(Artifact::ScrapeConfig))
    );
}

#[test]
fn dashboard_announces_reconciled_port() {
    let mut h = Harness::new(Options::from_pairs(&[("port", json!(9091))]));
    let sink = FakeDashboard::new();

    // Before any pass the declared option is the best answer.
    h.engine.publish_dashboard(&sink).unwrap();
    h.converge();
    h.engine.publish_dashboard(&sink).unwrap();

    let provided = sink.provided().borrow().clone();
    assert_eq!(provided.len(), 2);
    assert_eq!(provided[0].0, "prometheus");
    assert_eq!(provided[0].1, 9091);
    assert_eq!(provided[1].1, 9091);
}
