//! JSON-lines bridge between a bus master on the host and a simulated module.
//!
//! Each request is one JSON object per line, tagged by `type`:
//!
//! ```text
//! {"type":"Write","data":[13,2]}
//! {"type":"Read","len":8}
//! {"type":"Tick","count":1000}
//! {"type":"Status"}
//! ```

use super::SimTwi;
use crate::layout::common::{self, offset};
use crate::manager::{DEFAULT_TIMEOUT, SEND_CAPACITY};
use crate::modules::{Horn, Module, MotorController, MotorMover, Slave, SpeedMonitorManager};
use crate::timer::Ticks;
use crate::twi::TwiSlave;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Samples per speed monitor channel in the simulated speed monitor.
pub const SIM_SPEED_SAMPLES: usize = 8;
/// Channels in the simulated speed monitor.
pub const SIM_SPEED_CHANNELS: usize = 2;
/// Upper bound on one `Tick` request: a minute of simulated 1 kHz ticks.
/// The shared bridge is locked for the whole run.
pub const MAX_TICKS_PER_REQUEST: u32 = 60_000;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("read of {requested} bytes exceeds the {max} byte limit")]
    ReadTooLong { requested: usize, max: usize },
    #[error("tick count {requested} exceeds the {max} tick limit")]
    TickTooLong { requested: u32, max: u32 },
    #[error("register image of {0} bytes is shorter than the common header")]
    ShortHeader(usize),
    #[error("unknown module kind '{0}'")]
    UnknownModule(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeRequest {
    /// Master write: register address followed by data.
    Write { data: Vec<u8> },
    Read { len: usize },
    /// Advances the module by `count` ticks, updating after each.
    Tick { count: u32 },
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeResponse {
    Written { accepted: usize },
    Data { bytes: Vec<u8> },
    Ticked { count: u32, connected: bool },
    Status(ModuleStatus),
    Error { message: String },
}

/// The common header decoded from a register image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderView {
    pub signature_valid: bool,
    pub type_signature: u8,
    pub id: u8,
    pub name: String,
    pub status: u8,
    pub settings: u8,
}

impl HeaderView {
    pub fn decode(registers: &[u8]) -> Result<Self, BridgeError> {
        if registers.len() < offset::SIZE {
            return Err(BridgeError::ShortHeader(registers.len()));
        }
        let signature = &registers[offset::SIGNATURE..offset::SIGNATURE + common::SIGNATURE.len()];
        let name = &registers[offset::NAME..offset::NAME + common::NAME_LEN];
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        Ok(Self {
            signature_valid: signature == common::SIGNATURE,
            type_signature: registers[offset::TYPE_SIGNATURE],
            id: registers[offset::ID],
            name: String::from_utf8_lossy(&name[..end]).into_owned(),
            status: registers[offset::STATUS],
            settings: registers[offset::SETTINGS],
        })
    }

    pub fn active(&self) -> bool {
        self.status & (1 << common::status::ACTIVE) != 0
    }

    pub fn operational(&self) -> bool {
        self.status & (1 << common::status::OPERATIONAL) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub address: u8,
    pub connected: bool,
    pub led: bool,
    pub header: HeaderView,
    pub registers: Vec<u8>,
}

/// Settings applied to a freshly built module's slave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaveConfig {
    pub address: u8,
    pub timeout: Ticks,
    pub id: u8,
    pub name: String,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self { address: 0x20, timeout: DEFAULT_TIMEOUT, id: 0, name: String::new() }
    }
}

impl SlaveConfig {
    pub fn apply<H: TwiSlave>(&self, slave: &mut Slave<H>) {
        slave.set_address(self.address);
        slave.set_timeout(self.timeout);
        slave.set_id(self.id);
        slave.set_name(&self.name);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleKind {
    Horn,
    MotorController,
    MotorMover,
    SpeedMonitor,
}

impl ModuleKind {
    pub const NAMES: [&'static str; 4] =
        ["horn", "motor-controller", "motor-mover", "speed-monitor"];

    /// Builds a module of this kind on `twi`.
    pub fn build(self, twi: SimTwi, config: &SlaveConfig) -> Box<dyn Module + Send> {
        match self {
            ModuleKind::Horn => {
                let mut module = Horn::new(twi);
                config.apply(module.slave_mut());
                Box::new(module)
            }
            ModuleKind::MotorController => {
                let mut module = MotorController::new(twi);
                config.apply(module.slave_mut());
                Box::new(module)
            }
            ModuleKind::MotorMover => {
                let mut module = MotorMover::new(twi);
                config.apply(module.slave_mut());
                Box::new(module)
            }
            ModuleKind::SpeedMonitor => {
                let mut module =
                    SpeedMonitorManager::<_, u16, SIM_SPEED_CHANNELS, SIM_SPEED_SAMPLES>::new(twi);
                config.apply(module.slave_mut());
                Box::new(module)
            }
        }
    }
}

impl FromStr for ModuleKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "horn" => Ok(ModuleKind::Horn),
            "motor-controller" => Ok(ModuleKind::MotorController),
            "motor-mover" => Ok(ModuleKind::MotorMover),
            "speed-monitor" => Ok(ModuleKind::SpeedMonitor),
            other => Err(BridgeError::UnknownModule(other.to_string())),
        }
    }
}

/// A module together with the master side of its simulated bus.
pub struct Bridge<M: ?Sized> {
    twi: SimTwi,
    module: Box<M>,
}

impl<M: Module + ?Sized> Bridge<M> {
    /// `twi` must be the bus the module was built on.
    pub fn new(twi: SimTwi, module: Box<M>) -> Self {
        Self { twi, module }
    }

    pub fn handle(&mut self, request: BridgeRequest) -> BridgeResponse {
        match request {
            BridgeRequest::Write { data } => {
                let accepted = self.twi.master_write(&mut *self.module, &data);
                BridgeResponse::Written { accepted }
            }
            BridgeRequest::Read { len } if len > SEND_CAPACITY => {
                let error = BridgeError::ReadTooLong { requested: len, max: SEND_CAPACITY };
                BridgeResponse::Error { message: error.to_string() }
            }
            BridgeRequest::Read { len } => {
                BridgeResponse::Data { bytes: self.twi.master_read(&mut *self.module, len) }
            }
            BridgeRequest::Tick { count } if count > MAX_TICKS_PER_REQUEST => {
                let error =
                    BridgeError::TickTooLong { requested: count, max: MAX_TICKS_PER_REQUEST };
                BridgeResponse::Error { message: error.to_string() }
            }
            BridgeRequest::Tick { count } => {
                for _ in 0..count {
                    self.step();
                }
                BridgeResponse::Ticked { count, connected: self.module.connected() }
            }
            BridgeRequest::Status => match self.status() {
                Ok(status) => BridgeResponse::Status(status),
                Err(e) => BridgeResponse::Error { message: e.to_string() },
            },
        }
    }

    /// Parses one request line and serialises the response.
    pub fn handle_line(&mut self, line: &str) -> Result<String, BridgeError> {
        let response = match serde_json::from_str::<BridgeRequest>(line) {
            Ok(request) => {
                debug!(?request, "bridge request");
                self.handle(request)
            }
            Err(e) => BridgeResponse::Error { message: BridgeError::from(e).to_string() },
        };
        Ok(serde_json::to_string(&response)?)
    }

    /// One tick of the tick source followed by one control cycle.
    pub fn step(&mut self) {
        self.module.tick();
        self.module.update();
    }

    pub fn status(&self) -> Result<ModuleStatus, BridgeError> {
        let registers = self.module.registers().to_vec();
        Ok(ModuleStatus {
            address: self.twi.address(),
            connected: self.module.connected(),
            led: self.module.led(),
            header: HeaderView::decode(&registers)?,
            registers,
        })
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    pub fn twi(&self) -> &SimTwi {
        &self.twi
    }
}
