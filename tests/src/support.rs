//! In-memory stand-ins for the LAN, the adapter and the operator.

use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pnet::util::MacAddr;

use atacfg_common::config::{Config, UpdatePolicy};
use atacfg_common::error::{ProvisionError, SessionError};
use atacfg_common::network::interface::{LinkKind, NetworkInterfaceCandidate};
use atacfg_common::operator::{Operator, PlanSource};
use atacfg_common::plan::{PasswordPolicy, PlanDraft, ProvisioningPlan};
use atacfg_common::version::FirmwareVersion;
use atacfg_core::arp::{ArpError, NeighborTable};
use atacfg_core::assets::{AssetError, FirmwareAssets};
use atacfg_core::discovery::LanDiscovery;
use atacfg_core::locator::DeviceLocator;
use atacfg_core::network::tcp::{PortProber, ProbeOutcome};
use atacfg_core::selector::InterfaceSelector;
use atacfg_core::server::{FirmwareHost, ServeReport, ServerError};
use atacfg_core::session::{Credentials, ShellChannel, ShellConnector};
use atacfg_core::workflow::Collaborators;

pub const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
pub const GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
pub const ADAPTER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 42);
pub const ADAPTER_MAC: MacAddr = MacAddr(0xc0, 0x74, 0xad, 0x12, 0x34, 0x56);
pub const PRINTER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 20);
pub const PRINTER_MAC: MacAddr = MacAddr(0x00, 0x1b, 0xa9, 0x01, 0x02, 0x03);

pub const OLD_FIRMWARE: FirmwareVersion = FirmwareVersion::new(1, 0, 29, 0);
pub const NEW_FIRMWARE: FirmwareVersion = FirmwareVersion::new(2, 0, 0, 0);
pub const NEW_ADMIN: &str = "Str0ng!Pass";

pub fn eth0() -> NetworkInterfaceCandidate {
    NetworkInterfaceCandidate {
        name: "eth0".into(),
        description: "Intel Ethernet".into(),
        link: LinkKind::Wired,
        ipv4: LOCAL_IP,
        gateways: Vec::new(),
    }
}

// ─── LAN ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Lan {
    ports: HashMap<SocketAddrV4, ProbeOutcome>,
    neighbors: HashMap<Ipv4Addr, MacAddr>,
    probed: Vec<SocketAddrV4>,
}

/// A /24 with a gateway, a printer and the adapter, answering both the
/// port probes and the neighbor-table lookups.
#[derive(Clone, Default)]
pub struct FakeNetwork(Arc<Mutex<Lan>>);

impl FakeNetwork {
    pub fn home() -> Self {
        Self::default()
            .listening(GATEWAY, 80)
            .listening(PRINTER_IP, 80)
            .neighbor(PRINTER_IP, PRINTER_MAC)
            .listening(ADAPTER_IP, 80)
            .neighbor(ADAPTER_IP, ADAPTER_MAC)
    }

    pub fn listening(self, addr: Ipv4Addr, port: u16) -> Self {
        self.answer(addr, port, ProbeOutcome::Connected)
    }

    pub fn answer(self, addr: Ipv4Addr, port: u16, outcome: ProbeOutcome) -> Self {
        self.0
            .lock()
            .unwrap()
            .ports
            .insert(SocketAddrV4::new(addr, port), outcome);
        self
    }

    pub fn neighbor(self, addr: Ipv4Addr, mac: MacAddr) -> Self {
        self.0.lock().unwrap().neighbors.insert(addr, mac);
        self
    }

    pub fn probed(&self) -> Vec<SocketAddrV4> {
        self.0.lock().unwrap().probed.clone()
    }

    pub fn discovery(&self) -> LanDiscovery<FakeNetwork, FakeNetwork> {
        LanDiscovery::new(
            InterfaceSelector::new(self.clone()),
            DeviceLocator::new(self.clone(), self.clone()),
            Box::new(|| vec![eth0()]),
        )
    }
}

#[async_trait]
impl PortProber for FakeNetwork {
    async fn probe(&self, addr: SocketAddrV4) -> std::io::Result<ProbeOutcome> {
        let mut lan = self.0.lock().unwrap();
        lan.probed.push(addr);
        Ok(lan.ports.get(&addr).copied().unwrap_or(ProbeOutcome::Silent))
    }
}

#[async_trait]
impl NeighborTable for FakeNetwork {
    async fn lookup(&self, addr: Ipv4Addr) -> Result<Option<MacAddr>, ArpError> {
        Ok(self.0.lock().unwrap().neighbors.get(&addr).copied())
    }
}

// ─── Adapter ──────────────────────────────────────────────────────────────

pub struct Adapter {
    pub model: &'static str,
    pub version: FirmwareVersion,
    pub password: String,
    /// What the served image installs. `None` leaves the version untouched.
    pub installs: Option<FirmwareVersion>,
    pub sent: Vec<String>,
    /// Every password a connection was attempted with.
    pub logins: Vec<String>,
    pub closed: usize,
    /// Connection attempts refused after each restart, in restart order.
    outages: VecDeque<usize>,
    offline: usize,
    staged_password: Option<String>,
    last: Option<String>,
    replies: VecDeque<Vec<String>>,
}

/// The adapter's SSH console, reduced to the commands the workflow uses.
#[derive(Clone)]
pub struct FakeAdapter(Arc<Mutex<Adapter>>);

impl FakeAdapter {
    pub fn new(version: FirmwareVersion, password: &str) -> Self {
        Self(Arc::new(Mutex::new(Adapter {
            model: "HT801",
            version,
            password: password.to_string(),
            installs: None,
            sent: Vec::new(),
            logins: Vec::new(),
            closed: 0,
            outages: VecDeque::new(),
            offline: 0,
            staged_password: None,
            last: None,
            replies: VecDeque::new(),
        })))
    }

    pub fn installing(self, version: FirmwareVersion) -> Self {
        self.0.lock().unwrap().installs = Some(version);
        self
    }

    /// The n-th restart keeps the console unreachable for `outages[n]`
    /// connection attempts. Restarts past the list come back at once.
    pub fn offline_after_restarts(self, outages: &[usize]) -> Self {
        self.0.lock().unwrap().outages = outages.iter().copied().collect();
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.0.lock().unwrap().sent.clone()
    }

    pub fn logins(&self) -> Vec<String> {
        self.0.lock().unwrap().logins.clone()
    }

    pub fn version(&self) -> FirmwareVersion {
        self.0.lock().unwrap().version
    }

    pub fn password(&self) -> String {
        self.0.lock().unwrap().password.clone()
    }

    pub fn closed(&self) -> usize {
        self.0.lock().unwrap().closed
    }
}

impl Adapter {
    fn execute(&mut self, line: &str) {
        self.sent.push(line.to_string());

        match line {
            "status" => self.replies.push_back(vec![
                "status".to_string(),
                format!("Model: {} V2.1A", self.model),
                format!("Program -- {}    Bootloader -- 1.0.0.8", self.version),
                "GS>".to_string(),
            ]),
            "reboot" => {
                if let Some(password) = self.staged_password.take() {
                    self.password = password;
                }
                self.restart();
            }
            "y" => match self.last.as_deref() {
                Some("upgrade") => {
                    if let Some(version) = self.installs {
                        self.version = version;
                    }
                    self.restart();
                }
                Some("reset 0") => {
                    self.password = "admin".to_string();
                    self.restart();
                }
                _ => {}
            },
            _ => {
                if let Some(password) = line.strip_prefix("set 2 ") {
                    self.staged_password = Some(password.to_string());
                }
            }
        }

        self.last = Some(line.to_string());
    }

    fn restart(&mut self) {
        self.offline = self.outages.pop_front().unwrap_or(0);
    }
}

struct FakeConsole(Arc<Mutex<Adapter>>);

#[async_trait]
impl ShellChannel for FakeConsole {
    async fn send_line(&mut self, line: &str) -> Result<(), SessionError> {
        self.0.lock().unwrap().execute(line);
        Ok(())
    }

    async fn read_lines(&mut self, _window: Duration) -> Result<Vec<String>, SessionError> {
        Ok(self.0.lock().unwrap().replies.pop_front().unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.0.lock().unwrap().closed += 1;
        Ok(())
    }
}

#[async_trait]
impl ShellConnector for FakeAdapter {
    async fn connect(
        &self,
        addr: Ipv4Addr,
        credentials: &Credentials,
    ) -> Result<Box<dyn ShellChannel>, SessionError> {
        if addr != ADAPTER_IP {
            return Err(SessionError::Unreachable(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )));
        }

        let mut adapter = self.0.lock().unwrap();
        if adapter.offline > 0 {
            adapter.offline -= 1;
            return Err(SessionError::Unreachable(std::io::Error::from(
                std::io::ErrorKind::TimedOut,
            )));
        }
        adapter.logins.push(credentials.password.clone());
        if credentials.password != adapter.password {
            return Err(SessionError::AuthRejected);
        }
        adapter.replies.clear();
        Ok(Box::new(FakeConsole(Arc::clone(&self.0))))
    }
}

// ─── Firmware ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct Hosting {
    busy: bool,
    served: Vec<SocketAddrV4>,
}

#[derive(Clone, Default)]
pub struct FakeFirmwareHost(Arc<Mutex<Hosting>>);

impl FakeFirmwareHost {
    pub fn busy() -> Self {
        let host = Self::default();
        host.0.lock().unwrap().busy = true;
        host
    }

    pub fn served(&self) -> Vec<SocketAddrV4> {
        self.0.lock().unwrap().served.clone()
    }
}

#[async_trait]
impl FirmwareHost for FakeFirmwareHost {
    async fn ensure_available(&self, addr: SocketAddrV4) -> Result<(), ServerError> {
        if self.0.lock().unwrap().busy {
            return Err(ServerError::PortInUse(addr));
        }
        Ok(())
    }

    async fn serve(&self, addr: SocketAddrV4) -> Result<ServeReport, ServerError> {
        self.0.lock().unwrap().served.push(addr);
        Ok(ServeReport {
            requests: 2,
            elapsed: Duration::from_secs(50),
        })
    }
}

pub struct FakeAssets {
    root: PathBuf,
    latest: Option<FirmwareVersion>,
}

impl FakeAssets {
    pub fn offering(latest: Option<FirmwareVersion>) -> Self {
        Self {
            root: PathBuf::from("assets"),
            latest,
        }
    }
}

impl FirmwareAssets for FakeAssets {
    fn root(&self) -> &Path {
        &self.root
    }

    fn latest_version(&self, model: &str) -> Result<Option<FirmwareVersion>, AssetError> {
        Ok(self.latest.filter(|_| model == "ht801"))
    }
}

// ─── Operator ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct Answers {
    confirm: bool,
    passwords: Vec<String>,
    questions: Vec<String>,
    prompts: usize,
}

#[derive(Clone, Default)]
pub struct ScriptedOperator(Arc<Mutex<Answers>>);

impl ScriptedOperator {
    pub fn agreeing() -> Self {
        let operator = Self::default();
        operator.0.lock().unwrap().confirm = true;
        operator
    }

    pub fn with_passwords(self, passwords: &[&str]) -> Self {
        self.0.lock().unwrap().passwords = passwords.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn questions(&self) -> Vec<String> {
        self.0.lock().unwrap().questions.clone()
    }

    pub fn prompts(&self) -> usize {
        self.0.lock().unwrap().prompts
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&self, question: &str) -> bool {
        let mut answers = self.0.lock().unwrap();
        answers.questions.push(question.to_string());
        answers.confirm
    }

    fn password(&self, attempt: usize) -> Option<String> {
        let mut answers = self.0.lock().unwrap();
        answers.prompts += 1;
        answers.passwords.get(attempt).cloned()
    }
}

/// Hands out the same draft every time and remembers the policy it was
/// validated against.
#[derive(Clone)]
pub struct FixedPlan {
    draft: PlanDraft,
    policies: Arc<Mutex<Vec<PasswordPolicy>>>,
}

impl FixedPlan {
    pub fn new(reset: bool) -> Self {
        Self {
            draft: PlanDraft {
                phone: "(555) 867-5309".into(),
                sip_password: "sip-secret".into(),
                primary_server: "sip1.example.net".into(),
                failover_server: String::new(),
                admin_password: NEW_ADMIN.into(),
                reset,
            },
            policies: Arc::default(),
        }
    }

    pub fn policies(&self) -> Vec<PasswordPolicy> {
        self.policies.lock().unwrap().clone()
    }
}

impl PlanSource for FixedPlan {
    fn collect(&self, policy: &PasswordPolicy) -> Result<ProvisioningPlan, ProvisionError> {
        self.policies.lock().unwrap().push(*policy);
        Ok(self.draft.clone().validate(policy)?)
    }
}

// ─── Assembly ─────────────────────────────────────────────────────────────

pub struct Rig {
    pub network: FakeNetwork,
    pub adapter: FakeAdapter,
    pub firmware: FakeFirmwareHost,
    pub latest: Option<FirmwareVersion>,
    pub operator: ScriptedOperator,
    pub plan: FixedPlan,
}

impl Rig {
    pub fn new(adapter: FakeAdapter) -> Self {
        Self {
            network: FakeNetwork::home(),
            adapter,
            firmware: FakeFirmwareHost::default(),
            latest: Some(NEW_FIRMWARE),
            operator: ScriptedOperator::agreeing(),
            plan: FixedPlan::new(false),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            discovery: Box::new(self.network.discovery()),
            connector: Box::new(self.adapter.clone()),
            firmware: Box::new(self.firmware.clone()),
            assets: Box::new(FakeAssets::offering(self.latest)),
            operator: Box::new(self.operator.clone()),
            plans: Box::new(self.plan.clone()),
        }
    }
}

pub fn config(update: UpdatePolicy) -> Config {
    Config {
        update,
        ..Config::default()
    }
}
