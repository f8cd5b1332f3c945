//! Recording fakes for every collaborator trait.
//!
//! Each fake shares its state through an `Rc<RefCell<_>>` handle so tests
//! can hand the fake to the engine and still inspect the recorded calls
//! afterwards. The engine is single-threaded, so no locking is needed.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use crate::{
    DashboardSink, HostError, PackageManager, PortControl, RenderContext, Renderer,
    ServiceControl, Validator,
};

/// A recorded service-control call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Start(String),
    Restart(String),
}

/// Shared state of a [`FakeServices`].
#[derive(Debug, Default)]
pub struct ServicesState {
    /// Reported by `is_running`; updated by `start`/`restart`.
    pub running: bool,
    /// All start/restart calls, in order.
    pub calls: Vec<ServiceCall>,
}

/// Process-control fake.
#[derive(Debug, Clone, Default)]
pub struct FakeServices {
    state: Rc<RefCell<ServicesState>>,
}

impl FakeServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the service already running.
    pub fn running() -> Self {
        let fake = Self::default();
        fake.state.borrow_mut().running = true;
        fake
    }

    pub fn state(&self) -> Rc<RefCell<ServicesState>> {
        Rc::clone(&self.state)
    }
}

impl ServiceControl for FakeServices {
    fn is_running(&self, _service: &str) -> Result<bool, HostError> {
        Ok(self.state.borrow().running)
    }

    fn start(&self, service: &str) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        state.running = true;
        state.calls.push(ServiceCall::Start(service.to_string()));
        Ok(())
    }

    fn restart(&self, service: &str) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        state.running = true;
        state.calls.push(ServiceCall::Restart(service.to_string()));
        Ok(())
    }
}

/// Package-manager fake recording each install call.
#[derive(Debug, Clone, Default)]
pub struct FakePackages {
    installs: Rc<RefCell<Vec<Vec<String>>>>,
    fail_with: Rc<RefCell<Option<String>>>,
}

impl FakePackages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent installs fail, e.g. unreachable repositories.
    pub fn fail_with(&self, detail: &str) {
        *self.fail_with.borrow_mut() = Some(detail.to_string());
    }

    pub fn installs(&self) -> Rc<RefCell<Vec<Vec<String>>>> {
        Rc::clone(&self.installs)
    }
}

impl PackageManager for FakePackages {
    fn install(&self, packages: &[&str]) -> Result<(), HostError> {
        if let Some(detail) = self.fail_with.borrow().clone() {
            return Err(HostError::PackageInstall { detail });
        }
        self.installs
            .borrow_mut()
            .push(packages.iter().map(|p| p.to_string()).collect());
        Ok(())
    }
}

/// Validator fake, passing by default.
#[derive(Debug, Clone, Default)]
pub struct FakeValidator {
    calls: Rc<RefCell<usize>>,
    fail_with: Rc<RefCell<Option<String>>>,
}

impl FakeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent validations fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.fail_with.borrow_mut() = Some(message.to_string());
    }

    /// Let subsequent validations pass again.
    pub fn pass(&self) {
        *self.fail_with.borrow_mut() = None;
    }

    pub fn call_count(&self) -> usize {
        *self.calls.borrow()
    }
}

impl Validator for FakeValidator {
    fn validate(&self, _path: &Path) -> Result<(), HostError> {
        *self.calls.borrow_mut() += 1;
        match self.fail_with.borrow().clone() {
            Some(message) => Err(HostError::Validation { message }),
            None => Ok(()),
        }
    }
}

/// A recorded port operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortCall {
    Open(u16),
    Close(u16),
}

/// Port-control fake recording opens and closes in order.
#[derive(Debug, Clone, Default)]
pub struct FakePorts {
    calls: Rc<RefCell<Vec<PortCall>>>,
}

impl FakePorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Rc<RefCell<Vec<PortCall>>> {
        Rc::clone(&self.calls)
    }
}

impl PortControl for FakePorts {
    fn open_port(&self, port: u16) -> Result<(), HostError> {
        self.calls.borrow_mut().push(PortCall::Open(port));
        Ok(())
    }

    fn close_port(&self, port: u16) -> Result<(), HostError> {
        self.calls.borrow_mut().push(PortCall::Close(port));
        Ok(())
    }
}

/// Dashboard sink fake.
#[derive(Debug, Clone, Default)]
pub struct FakeDashboard {
    provided: Rc<RefCell<Vec<(String, u16, String)>>>,
}

impl FakeDashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provided(&self) -> Rc<RefCell<Vec<(String, u16, String)>>> {
        Rc::clone(&self.provided)
    }
}

impl DashboardSink for FakeDashboard {
    fn provide(&self, source_type: &str, port: u16, description: &str) -> Result<(), HostError> {
        self.provided
            .borrow_mut()
            .push((source_type.to_string(), port, description.to_string()));
        Ok(())
    }
}

/// Renderer fake: substitutes like the real template directory but keeps
/// template sources and digests in memory so tests can flip a digest
/// without touching the filesystem.
#[derive(Debug, Clone, Default)]
pub struct FakeRenderer {
    templates: Rc<RefCell<BTreeMap<String, String>>>,
    digests: Rc<RefCell<BTreeMap<String, String>>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template body. Its digest starts at `"v1"`.
    pub fn add_template(&self, name: &str, body: &str) {
        self.templates
            .borrow_mut()
            .insert(name.to_string(), body.to_string());
        self.digests
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| "v1".to_string());
    }

    /// Change a template's digest without changing its body, simulating
    /// an upgrade that ships a new template.
    pub fn set_digest(&self, name: &str, digest: &str) {
        self.digests
            .borrow_mut()
            .insert(name.to_string(), digest.to_string());
    }
}

impl Renderer for FakeRenderer {
    fn render(
        &self,
        template: &str,
        target: &Path,
        context: &RenderContext,
    ) -> Result<(), HostError> {
        let templates = self.templates.borrow();
        let source = templates
            .get(template)
            .ok_or_else(|| HostError::MissingTemplate {
                name: template.to_string(),
            })?;

        let mut rendered = source.clone();
        for (key, value) in context {
            rendered = rendered.replace(&format!("{{{{ {} }}}}", key), value);
        }
        if rendered.contains("{{") {
            return Err(HostError::UndefinedVariable {
                template: template.to_string(),
                variable: "unknown".to_string(),
            });
        }

        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, rendered)?;
        Ok(())
    }

    fn digest(&self, template: &str) -> Result<String, HostError> {
        self.digests
            .borrow()
            .get(template)
            .cloned()
            .ok_or_else(|| HostError::MissingTemplate {
                name: template.to_string(),
            })
    }
}
