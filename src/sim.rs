//! Chip model for driver tests
//!
//! Each [`SimNode`] holds a register file, a FIFO and a DIO0 line. Nodes
//! share an [`Air`]: entering Transmit with a non-empty FIFO puts the frame
//! on the air, and once its air time has passed it reaches every other node
//! that is in Receive on the same sync word. Leaving Transmit earlier
//! aborts the frame. DIO0 only fires on a low to high change of the mapped
//! flag, like the real pin. Time only moves when a [`SimDelay`] sleeps.

use core::convert::Infallible;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embassy_futures::yield_now;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::{ErrorType as SpiErrorType, Operation, SpiDevice};

use crate::radio::Clock;

const OPMODE: usize = 0x01;
const OSC1: usize = 0x0A;
const RSSI_VALUE: usize = 0x24;
const DIO_MAPPING1: usize = 0x25;
const IRQ_FLAGS1: usize = 0x27;
const IRQ_FLAGS2: usize = 0x28;
const SYNC_VALUE1: usize = 0x2F;
const SYNC_VALUE2: usize = 0x30;
const PACKET_CONFIG2: usize = 0x3D;
const TEMP1: usize = 0x4E;

const MODE_MASK: u8 = 0x1C;
const MODE_TX: u8 = 0x0C;
const MODE_RX: u8 = 0x10;

const PACKET_SENT: u8 = 0x08;
const PAYLOAD_READY: u8 = 0x04;
const RX_RESTART: u8 = 0x04;

/// Time a frame spends on the air.
const AIRTIME_MS: u64 = 2;

/// Temperature sensor value reported in TEMP2.
pub(crate) const TEMP2_READING: u8 = 0x7A;
/// RSSI register value for every received frame (-80 dBm).
pub(crate) const RSSI_READING: u8 = 80;

/// Chip behaviour knobs
#[derive(Clone, Copy, Default)]
pub(crate) struct Faults {
    /// Every read returns zero, writes are lost
    pub dead: bool,
    /// The temperature sensor never finishes
    pub temperature_stuck: bool,
    /// RC calibration never finishes
    pub calibration_stuck: bool,
    /// Drop every frame this node transmits
    pub deaf_air: bool,
    /// Bit 0 of SYNCVALUE1 always reads back as zero
    pub sync_bit0_stuck: bool,
}

struct OnAir {
    frame: Vec<u8>,
    done_at_ms: u64,
}

pub(crate) struct SimNode {
    regs: RefCell<[u8; 128]>,
    fifo: RefCell<VecDeque<u8>>,
    dio0: Cell<bool>,
    irq: Cell<bool>,
    on_air: RefCell<Option<OnAir>>,
    temperature_polls: Cell<u8>,
    transactions: Cell<usize>,
    fifo_bursts: Cell<usize>,
    transmitted: RefCell<Vec<Vec<u8>>>,
    aborted: Cell<usize>,
    rx_restarts: Cell<usize>,
    time: SimTime,
    faults: Faults,
}

impl SimNode {
    fn new(faults: Faults, time: SimTime) -> Self {
        let mut regs = [0u8; 128];
        regs[OPMODE] = 0x04;
        Self {
            regs: RefCell::new(regs),
            fifo: RefCell::new(VecDeque::new()),
            dio0: Cell::new(false),
            irq: Cell::new(false),
            on_air: RefCell::new(None),
            temperature_polls: Cell::new(0),
            transactions: Cell::new(0),
            fifo_bursts: Cell::new(0),
            transmitted: RefCell::new(Vec::new()),
            aborted: Cell::new(0),
            rx_restarts: Cell::new(0),
            time,
            faults,
        }
    }

    /// SPI transactions seen so far.
    pub fn transactions(&self) -> usize {
        self.transactions.get()
    }

    /// Burst reads of the FIFO seen so far.
    pub fn fifo_bursts(&self) -> usize {
        self.fifo_bursts.get()
    }

    /// Every frame this node sent out completely.
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.transmitted.borrow().clone()
    }

    /// Frames cut off by leaving Transmit too early.
    pub fn aborted(&self) -> usize {
        self.aborted.get()
    }

    /// Receiver restarts requested through PACKETCONFIG2.
    pub fn rx_restarts(&self) -> usize {
        self.rx_restarts.get()
    }

    /// Raw register value.
    pub fn register(&self, address: u8) -> u8 {
        self.regs.borrow()[usize::from(address & 0x7F)]
    }

    fn mode(&self) -> u8 {
        self.regs.borrow()[OPMODE] & MODE_MASK
    }

    fn sync_word(&self) -> [u8; 2] {
        let regs = self.regs.borrow();
        [regs[SYNC_VALUE1], regs[SYNC_VALUE2]]
    }

    /// Recomputes the DIO0 level and latches a rising edge.
    fn refresh_dio0(&self) {
        let regs = self.regs.borrow();
        let mapped = match regs[DIO_MAPPING1] & 0xC0 {
            0x00 => PACKET_SENT,
            0x40 => PAYLOAD_READY,
            _ => 0,
        };
        let high = regs[IRQ_FLAGS2] & mapped != 0;
        drop(regs);

        let was_high = self.dio0.replace(high);
        if high && !was_high {
            self.irq.set(true);
        }
    }

    /// Finishes the frame on the air once its air time has passed.
    fn finish_transmit(&self, now_ms: u64) -> Option<Vec<u8>> {
        let mut on_air = self.on_air.borrow_mut();
        if !matches!(&*on_air, Some(pending) if pending.done_at_ms <= now_ms) {
            return None;
        }
        let frame = (*on_air).take()?.frame;
        drop(on_air);

        self.regs.borrow_mut()[IRQ_FLAGS2] |= PACKET_SENT;
        self.transmitted.borrow_mut().push(frame.clone());
        self.refresh_dio0();
        Some(frame)
    }

    fn read(&self, address: u8) -> u8 {
        if self.faults.dead {
            return 0;
        }
        let index = usize::from(address & 0x7F);
        match index {
            0x00 => {
                let mut fifo = self.fifo.borrow_mut();
                let byte = fifo.pop_front().unwrap_or(0);
                if fifo.is_empty() {
                    self.regs.borrow_mut()[IRQ_FLAGS2] &= !PAYLOAD_READY;
                }
                byte
            }
            IRQ_FLAGS1 => 0x80,
            TEMP1 => {
                if self.faults.temperature_stuck {
                    return 0x04;
                }
                let polls = self.temperature_polls.get();
                if polls > 0 {
                    self.temperature_polls.set(polls - 1);
                    0x04
                } else {
                    0x00
                }
            }
            SYNC_VALUE1 if self.faults.sync_bit0_stuck => self.regs.borrow()[index] & 0xFE,
            OSC1 if self.faults.calibration_stuck => 0x00,
            OSC1 => 0x40,
            0x4F => TEMP2_READING,
            _ => self.regs.borrow()[index],
        }
    }

    fn write(&self, address: u8, value: u8) {
        if self.faults.dead {
            return;
        }
        let index = usize::from(address & 0x7F);
        match index {
            0x00 => self.fifo.borrow_mut().push_back(value),
            OPMODE => {
                let previous = self.mode();
                self.regs.borrow_mut()[OPMODE] = value;
                self.mode_changed(previous, value & MODE_MASK);
            }
            PACKET_CONFIG2 => {
                if value & RX_RESTART != 0 {
                    self.fifo.borrow_mut().clear();
                    self.regs.borrow_mut()[IRQ_FLAGS2] &= !PAYLOAD_READY;
                    self.rx_restarts.set(self.rx_restarts.get() + 1);
                }
                self.regs.borrow_mut()[index] = value & !RX_RESTART;
            }
            TEMP1 => {
                if value & 0x08 != 0 {
                    self.temperature_polls.set(1);
                }
            }
            _ => self.regs.borrow_mut()[index] = value,
        }
    }

    fn mode_changed(&self, previous: u8, current: u8) {
        if previous == MODE_TX && current != MODE_TX {
            self.regs.borrow_mut()[IRQ_FLAGS2] &= !PACKET_SENT;
            if self.on_air.borrow_mut().take().is_some() {
                self.aborted.set(self.aborted.get() + 1);
            }
        }
        if current == MODE_TX && previous != MODE_TX {
            let frame: Vec<u8> = self.fifo.borrow_mut().drain(..).collect();
            if !frame.is_empty() {
                *self.on_air.borrow_mut() = Some(OnAir {
                    frame,
                    done_at_ms: self.time.now_ms() + AIRTIME_MS,
                });
            }
        }
    }

    fn hear(&self, frame: &[u8]) {
        if self.faults.dead || self.mode() != MODE_RX {
            return;
        }
        // The receiver holds on to an unread packet
        if self.regs.borrow()[IRQ_FLAGS2] & PAYLOAD_READY != 0 {
            return;
        }
        let mut fifo = self.fifo.borrow_mut();
        fifo.clear();
        fifo.extend(frame.iter().copied());
        drop(fifo);

        let mut regs = self.regs.borrow_mut();
        regs[IRQ_FLAGS2] |= PAYLOAD_READY;
        regs[RSSI_VALUE] = RSSI_READING;
        drop(regs);
        self.refresh_dio0();
    }
}

/// Shared radio medium
pub(crate) struct Air {
    nodes: RefCell<Vec<Rc<SimNode>>>,
    time: SimTime,
}

impl Air {
    pub fn new(time: &SimTime) -> Rc<Self> {
        Rc::new(Self {
            nodes: RefCell::new(Vec::new()),
            time: time.clone(),
        })
    }

    /// Adds a healthy chip.
    pub fn node(self: &Rc<Self>) -> (SimSpi, Rc<SimNode>) {
        self.node_with(Faults::default())
    }

    /// Adds a chip with the given faults.
    pub fn node_with(self: &Rc<Self>, faults: Faults) -> (SimSpi, Rc<SimNode>) {
        let node = Rc::new(SimNode::new(faults, self.time.clone()));
        self.nodes.borrow_mut().push(node.clone());
        let spi = SimSpi {
            node: node.clone(),
            air: self.clone(),
        };
        (spi, node)
    }

    /// Delivers every frame whose air time has passed.
    fn tick(&self) {
        let now = self.time.now_ms();
        let nodes = self.nodes.borrow().clone();
        for node in &nodes {
            if let Some(frame) = node.finish_transmit(now) {
                self.propagate(node, &frame);
            }
        }
    }

    fn propagate(&self, from: &Rc<SimNode>, frame: &[u8]) {
        if from.faults.deaf_air {
            return;
        }
        let sync = from.sync_word();
        for node in self.nodes.borrow().iter() {
            if !Rc::ptr_eq(node, from) && node.sync_word() == sync {
                node.hear(frame);
            }
        }
    }
}

/// SPI side of a [`SimNode`]
pub(crate) struct SimSpi {
    node: Rc<SimNode>,
    air: Rc<Air>,
}

impl SimSpi {
    /// DIO0 pin of this chip.
    pub fn irq(&self) -> SimIrq {
        SimIrq {
            node: self.node.clone(),
            air: self.air.clone(),
        }
    }
}

impl SpiErrorType for SimSpi {
    type Error = Infallible;
}

impl SpiDevice for SimSpi {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        self.node.transactions.set(self.node.transactions.get() + 1);
        self.air.tick();

        let mut address = None;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    let data = match address {
                        None => match bytes.split_first() {
                            Some((&first, rest)) => {
                                address = Some(first);
                                rest
                            }
                            None => continue,
                        },
                        Some(_) => &bytes[..],
                    };
                    let Some(start) = address else { continue };
                    for (offset, &value) in data.iter().enumerate() {
                        let target = if start & 0x7F == 0 {
                            0
                        } else {
                            (start & 0x7F).wrapping_add(offset as u8)
                        };
                        self.node.write(target, value);
                    }
                    if start & 0x7F != 0 {
                        address = Some(start.wrapping_add(data.len() as u8));
                    }
                }
                Operation::Read(buf) => {
                    let Some(start) = address else { continue };
                    if start & 0x7F == 0 {
                        self.node.fifo_bursts.set(self.node.fifo_bursts.get() + 1);
                    }
                    for (offset, byte) in buf.iter_mut().enumerate() {
                        let target = if start & 0x7F == 0 {
                            0
                        } else {
                            (start & 0x7F).wrapping_add(offset as u8)
                        };
                        *byte = self.node.read(target);
                    }
                }
                _ => {}
            }
        }

        self.node.refresh_dio0();
        Ok(())
    }
}

/// DIO0 line of a [`SimNode`]. A rising edge is a raised, unconsumed flag.
pub(crate) struct SimIrq {
    node: Rc<SimNode>,
    air: Rc<Air>,
}

impl SimIrq {
    async fn edge(&mut self) -> Result<(), Infallible> {
        loop {
            self.air.tick();
            if self.node.irq.replace(false) {
                return Ok(());
            }
            yield_now().await;
        }
    }
}

impl embedded_hal::digital::ErrorType for SimIrq {
    type Error = Infallible;
}

impl Wait for SimIrq {
    async fn wait_for_high(&mut self) -> Result<(), Infallible> {
        self.edge().await
    }

    async fn wait_for_low(&mut self) -> Result<(), Infallible> {
        yield_now().await;
        Ok(())
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Infallible> {
        self.edge().await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Infallible> {
        yield_now().await;
        Ok(())
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Infallible> {
        self.edge().await
    }
}

/// Reset line that records every level it was driven to.
#[derive(Default)]
pub(crate) struct SimReset {
    pub levels: Vec<bool>,
}

impl embedded_hal::digital::ErrorType for SimReset {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for SimReset {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.levels.push(true);
        Ok(())
    }
}

/// Simulated time, shared by every delay and clock of a test.
#[derive(Clone, Default)]
pub(crate) struct SimTime {
    now_ns: Rc<Cell<u64>>,
}

impl SimTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay { time: self.clone() }
    }

    fn advance(&self, ns: u64) {
        self.now_ns.set(self.now_ns.get() + ns);
    }
}

impl Clock for SimTime {
    fn now_ms(&self) -> u64 {
        self.now_ns.get() / 1_000_000
    }
}

/// Delay that advances [`SimTime`] and yields once.
#[derive(Clone)]
pub(crate) struct SimDelay {
    time: SimTime,
}

impl DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.time.advance(u64::from(ns));
        yield_now().await;
    }

    async fn delay_us(&mut self, us: u32) {
        self.time.advance(u64::from(us) * 1_000);
        yield_now().await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.time.advance(u64::from(ms) * 1_000_000);
        yield_now().await;
    }
}
