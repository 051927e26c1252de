#![no_std]
#![no_main]

//! Demo binary: wires the message-protocol registry over a blocking
//! UART, split into independent TX/RX halves the way a real duplex link
//! would be, and polls it from a single task. Board bring-up, the UART
//! driver, and defmt/panic wiring are external collaborators (`sys.rs`);
//! this file only assembles them around the library.

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::uart::{Config, DataBits, Parity, StopBits, Uart, UartRx, UartTx};
use embassy_time::{Duration, Timer};

use embedded_msg_protocol::{
    ChannelId, Error as ProtoError, PayloadType, RecvCallback, Registry, Transport, TransportError,
};

mod sys;

const CHANNEL_COUNT: usize = 4;
const SEND_CAP: usize = 96;
const STAGING_CAP: usize = 64;
const FIFO_CAP: usize = 256;

struct UartTxTransport<'d> {
    tx: UartTx<'d, embassy_rp::uart::Blocking>,
}

impl<'d> Transport for UartTxTransport<'d> {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.tx.blocking_write(data).map_err(|_| TransportError)
    }

    fn read_available(&mut self, _buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(0)
    }
}

struct UartRxTransport<'d> {
    rx: UartRx<'d, embassy_rp::uart::Blocking>,
}

impl<'d> Transport for UartRxTransport<'d> {
    fn write(&mut self, _data: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.rx.read(buf) {
            Ok(()) => Ok(buf.len()),
            Err(embassy_rp::uart::Error::Overrun) => Ok(0),
            Err(_) => Err(TransportError),
        }
    }
}

struct LoggingCallback;

impl RecvCallback for LoggingCallback {
    fn on_message(&mut self, len: u8, id_type: u8, payload: &[u8]) {
        info!(
            "delivered cid={} ptt={} len={} payload={:?}",
            id_type >> 4,
            id_type & 0x0F,
            len,
            payload
        );
    }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    let mut cfg = Config::default();
    cfg.baudrate = 115_200;
    cfg.data_bits = DataBits::Eight;
    cfg.parity = Parity::None;
    cfg.stop_bits = StopBits::One;

    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, cfg);
    let (tx, rx) = uart.split();
    let mut tx_transport = UartTxTransport { tx };
    let mut rx_transport = UartRxTransport { rx };

    let mut registry: Registry<CHANNEL_COUNT, SEND_CAP, STAGING_CAP, FIFO_CAP> =
        Registry::new(cfg!(feature = "crc"));
    let cid = ChannelId::new(0).expect("0 is always in range");
    registry
        .register_send(cid, &mut tx_transport)
        .expect("channel 0 is in range");
    registry
        .register_recv(cid, &mut rx_transport)
        .expect("channel 0 is in range");
    let mut cb = LoggingCallback;
    registry
        .register_callback(cid, Some(&mut cb))
        .expect("channel 0 is in range");

    let mut heartbeat: u8 = 0;
    loop {
        registry.poll_once();

        if let Err(ProtoError::SendSinkNotRegistered) =
            registry.send(cid, PayloadType::UINT8, &[heartbeat])
        {
            warn!("send sink missing on channel 0");
        }
        heartbeat = heartbeat.wrapping_add(1);

        Timer::after(Duration::from_millis(20)).await;
    }
}
