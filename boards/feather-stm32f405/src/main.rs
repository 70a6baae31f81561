#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod device_id;
mod flash_store;
mod onewire;
mod sink;

stm32_tim2_monotonic!(Mono, 1_000_000);

/// Scheduler period; bounds how late any timer can be serviced
const TICK_MS: u32 = 10;

/// Milliseconds since `Mono::start`, wrapping every ~49.7 days
fn now_ms() -> u32 {
    (Mono::now().ticks() / 1_000) as u32
}

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1])]
mod app {
    use super::*;
    use defmt::{error, info, warn, Debug2Format};
    use embassy_stm32::flash::Flash;
    use embassy_stm32::gpio::{Level, Output, OutputOpenDrain, Speed};
    use embassy_stm32::rcc::{Hse, HseMode};
    use embassy_stm32::time::Hertz;
    use thermonode_core::{config, Node, NodeConfig, NodeSettings};

    use flash_store::FlashStore;
    use onewire::PinBus;
    use sink::RttNotifier;

    type ThermoNode = Node<PinBus, RttNotifier, Output<'static>>;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        node: ThermoNode,
        store: FlashStore,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Thermonode starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE
        let mut rcc_config = embassy_stm32::Config::default();
        rcc_config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        rcc_config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        rcc_config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        rcc_config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        rcc_config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        rcc_config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        rcc_config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        let p = embassy_stm32::init(rcc_config);
        info!("Device UID: {=str}", device_id::uid_hex());

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        let timer_clock_hz = 84_000_000;
        Mono::start(timer_clock_hz);
        info!("TIM2 monotonic timer initialized at 1 MHz");

        let mut store = FlashStore::new(Flash::new_blocking(p.FLASH));
        let mut node_config = match config::load(&mut store) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("No usable stored config ({}), using defaults", e);
                NodeConfig::default()
            }
        };
        if node_config.guid == [0u8; 8] {
            node_config.guid = device_id::node_guid();
        }

        let bus = match PinBus::new(OutputOpenDrain::new(p.PB8, Level::High, Speed::Low)) {
            Ok(bus) => bus,
            Err(e) => defmt::panic!("1-Wire bus held low: {}", Debug2Format(&e)),
        };

        // Red LED on D13 (PC1) is lit when driven high
        let led = Output::new(p.PC1, Level::Low, Speed::Low);
        let settings = NodeSettings {
            led_active_low: false,
            ..NodeSettings::default()
        };

        let node = Node::new(bus, RttNotifier::new(), led, node_config, settings, now_ms());

        if scheduler::spawn().is_err() {
            error!("Scheduler task already running");
        }

        (Shared {}, Local { node, store })
    }

    /// Cooperative loop driving every node activity
    #[task(priority = 1, local = [node, store])]
    async fn scheduler(cx: scheduler::Context) {
        info!("Scheduler task started");
        let node = cx.local.node;
        let store = cx.local.store;
        loop {
            node.tick(now_ms());
            match node.persist(store, now_ms()) {
                Ok(_) => {}
                Err(e) => error!("Config save failed: {}", e),
            }
            Mono::delay(u64::from(TICK_MS).millis()).await;
        }
    }
}
