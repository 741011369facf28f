use clap::{Parser, Subcommand};
use mymusic_recorder::midi::device::MidiDeviceManager;
use mymusic_recorder::midi::output::{HardwareOutput, open_hardware_output};
use mymusic_recorder::project::{load_notes, save_notes};
use mymusic_recorder::{
    CpalAnchorPlayer, EngineConfig, EngineError, HardwareInput, LogDisplay, MonotonicClock,
    Result, SharedClock, TransportController, load_anchor,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// The scheduled output queue is flushed at this period; it bounds MIDI
// output jitter independently of the scheduler interval.
const FLUSH_PERIOD: Duration = Duration::from_millis(1);

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Engine config file (RON). Defaults to the user config directory.
    #[clap(long, global = true, value_parser)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List MIDI input and output ports
    Ports,

    /// Record a take from a MIDI input and save it as JSON
    Record {
        /// Input port name (first port if omitted)
        #[clap(short, long, value_parser)]
        input: Option<String>,

        /// Where to write the note list
        #[clap(short, long, value_parser)]
        out: PathBuf,

        /// Stop after this many seconds instead of waiting for Enter
        #[clap(short, long, value_parser)]
        seconds: Option<f64>,

        /// Existing note list to merge the take into
        #[clap(long, value_parser)]
        merge_into: Option<PathBuf>,

        /// Audio file to play along while recording
        #[clap(long, value_parser)]
        audio: Option<PathBuf>,

        /// Timeline position (ms) the take starts at
        #[clap(long, value_parser, default_value_t = 0.0)]
        from: f64,
    },

    /// Play a saved note list through a MIDI output
    Play {
        file: PathBuf,

        /// Output port name (first port if omitted)
        #[clap(short, long, value_parser)]
        output: Option<String>,

        /// Audio file to play in sync
        #[clap(long, value_parser)]
        audio: Option<PathBuf>,

        /// Timeline position (ms) to start from
        #[clap(long, value_parser, default_value_t = 0.0)]
        from: f64,
    },

    /// Send Note-Off for every note on every channel
    Panic {
        #[clap(short, long, value_parser)]
        output: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = EngineConfig::load_or_default(args.config.as_deref())?;

    match args.command {
        Command::Ports => list_ports(&config),
        Command::Record {
            input,
            out,
            seconds,
            merge_into,
            audio,
            from,
        } => record(
            &config,
            input,
            &out,
            seconds,
            merge_into.as_deref(),
            audio.as_deref(),
            from,
        ),
        Command::Play {
            file,
            output,
            audio,
            from,
        } => play(&config, &file, output, audio.as_deref(), from),
        Command::Panic { output } => {
            let mut out = open_output(&config, output)?;
            mymusic_recorder::midi::panic(&mut out)?;
            Ok(())
        }
    }
}

fn list_ports(config: &EngineConfig) -> Result<()> {
    let manager = MidiDeviceManager::new(config.midi.client_name.clone());

    println!("MIDI inputs:");
    for device in manager.list_input_ports()? {
        let marker = if device.is_default { "*" } else { " " };
        println!(" {} {}", marker, device.name);
    }

    println!("MIDI outputs:");
    for device in manager.list_output_ports()? {
        let marker = if device.is_default { "*" } else { " " };
        println!(" {} {}", marker, device.name);
    }
    Ok(())
}

fn open_output(config: &EngineConfig, port: Option<String>) -> Result<HardwareOutput> {
    let port = match port {
        Some(port) => port,
        None => MidiDeviceManager::new(config.midi.client_name.clone())
            .default_output_name()?
            .ok_or_else(|| EngineError::PortNotFound("<default output>".to_string()))?,
    };
    open_hardware_output(&port, &config.midi.client_name)
}

fn new_transport(
    config: &EngineConfig,
    clock: &SharedClock,
    audio: Option<&Path>,
) -> Result<TransportController> {
    let mut transport = TransportController::new(
        clock.clone(),
        config.scheduler,
        Box::new(LogDisplay::default()),
    );

    if let Some(path) = audio {
        let anchor = load_anchor(path)?;
        let player = CpalAnchorPlayer::new(anchor, clock.clone())?;
        transport.set_anchor(Some(Rc::new(RefCell::new(player))));
    }
    Ok(transport)
}

fn record(
    config: &EngineConfig,
    port: Option<String>,
    out: &Path,
    seconds: Option<f64>,
    merge_into: Option<&Path>,
    audio: Option<&Path>,
    from: f64,
) -> Result<()> {
    let clock = MonotonicClock::shared();
    let mut transport = new_transport(config, &clock, audio)?;

    if let Some(path) = merge_into {
        transport.load_notes(load_notes(path)?)?;
    }

    let port = match port {
        Some(port) => port,
        None => MidiDeviceManager::new(config.midi.client_name.clone())
            .default_input_name()?
            .ok_or_else(|| EngineError::PortNotFound("<default input>".to_string()))?,
    };
    let mut input = HardwareInput::new(port, clock.clone(), &config.midi);

    transport.seek(from)?;
    transport.record(&mut input)?;

    let deadline = seconds.map(|s| clock.now() + s * 1000.0);
    let enter_pressed = Arc::new(AtomicBool::new(false));
    if deadline.is_none() {
        println!("Recording... press Enter to stop.");
        let flag = Arc::clone(&enter_pressed);
        std::thread::spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().read_line(&mut line);
            flag.store(true, Ordering::Relaxed);
        });
    }

    let interval = config.scheduler.interval_ms;
    let mut next_tick = clock.now();
    loop {
        let now = clock.now();
        if now >= next_tick {
            transport.tick()?;
            next_tick = now + interval;
        }

        let timed_out = deadline.is_some_and(|d| now >= d);
        if timed_out || enter_pressed.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(FLUSH_PERIOD);
    }

    let added = transport.stop_recording();
    save_notes(out, transport.notes())?;
    println!(
        "Recorded {} notes ({} total) to {}",
        added,
        transport.notes().len(),
        out.display()
    );
    Ok(())
}

fn play(
    config: &EngineConfig,
    file: &Path,
    port: Option<String>,
    audio: Option<&Path>,
    from: f64,
) -> Result<()> {
    let clock = MonotonicClock::shared();
    let mut transport = new_transport(config, &clock, audio)?;
    transport.load_notes(load_notes(file)?)?;

    let output = Rc::new(RefCell::new(open_output(config, port)?));
    transport.set_output(Some(output.clone()));

    transport.seek(from)?;
    transport.play()?;

    let interval = config.scheduler.interval_ms;
    let mut next_tick = clock.now();
    while transport.is_playing() {
        let now = clock.now();
        if now >= next_tick {
            transport.tick()?;
            next_tick = now + interval;
        }
        output.borrow_mut().flush(now)?;
        std::thread::sleep(FLUSH_PERIOD);
    }

    // Deliver the trailing Note-Offs
    while output.borrow().pending_len() > 0 {
        output.borrow_mut().flush(clock.now())?;
        std::thread::sleep(FLUSH_PERIOD);
    }
    Ok(())
}
