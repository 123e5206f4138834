use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fastream_frame::ChannelMask;
use fastream_stream::{ServerConfig, SubscribeOptions, Subscription};
use fastream_transport::ShutdownHandle;
use tracing::{info, warn};

use crate::cmd::{parse_duration, CaptureArgs};
use crate::exit::{mask_error, stream_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_block, OutputFormat};

type ActiveStream = Arc<Mutex<Option<ShutdownHandle>>>;

pub fn run(args: CaptureArgs, format: OutputFormat) -> CliResult<i32> {
    let mask: ChannelMask = args
        .mask
        .parse()
        .map_err(|err| mask_error(&args.mask, err))?;
    let retry_delay = parse_duration(&args.retry_delay)?;
    let config = args.server.config()?;
    let options = SubscribeOptions {
        decimated: args.decimated,
        uncork: args.uncork,
    };

    let running = Arc::new(AtomicBool::new(true));
    let active: ActiveStream = Arc::new(Mutex::new(None));
    install_ctrlc_handler(running.clone(), active.clone())?;

    let mut capture = Capture {
        config,
        mask,
        options,
        samples: args.samples,
        limit: args.blocks,
        follow: args.follow,
        format,
        printed: 0,
        running,
        active,
    };
    capture.run(retry_delay)
}

struct Capture {
    config: ServerConfig,
    mask: ChannelMask,
    options: SubscribeOptions,
    samples: usize,
    limit: Option<u64>,
    follow: bool,
    format: OutputFormat,
    printed: u64,
    running: Arc<AtomicBool>,
    active: ActiveStream,
}

impl Capture {
    fn run(&mut self, retry_delay: Duration) -> CliResult<i32> {
        while self.is_running() && !self.done() {
            let sub = match Subscription::subscribe(&self.config, self.mask, self.options) {
                Ok(sub) => sub,
                Err(err) if self.follow => {
                    warn!(error = %err, kind = %err.kind(), "subscribe failed, retrying");
                    self.pause(retry_delay);
                    continue;
                }
                Err(err) => return Err(stream_error("subscribe failed", err)),
            };

            info!(
                endpoint = %self.config.endpoint(),
                channels = sub.channel_count(),
                samples = self.samples,
                "capturing"
            );
            match sub.shutdown_handle() {
                Ok(handle) => self.set_active(Some(handle)),
                Err(err) => warn!(error = %err, "no shutdown handle, Ctrl-C waits for the next read"),
            }
            let result = self.drain(sub);
            self.set_active(None);

            match result {
                Ok(()) => {}
                Err(_) if !self.is_running() => break,
                Err(err) if self.follow => {
                    warn!(error = %err, kind = %err.kind(), "stream failed, resubscribing");
                    self.pause(retry_delay);
                }
                Err(err) => return Err(stream_error("read failed", err)),
            }
        }
        Ok(SUCCESS)
    }

    /// Print blocks until the limit is reached, the user interrupts, or the
    /// stream fails.
    fn drain(&mut self, mut sub: Subscription) -> fastream_stream::Result<()> {
        let channel_ids = sub.channel_ids();
        while self.is_running() && !self.done() {
            let block = sub.read(self.samples)?;
            print_block(&block, &channel_ids, self.printed, self.format);
            self.printed = self.printed.saturating_add(1);
        }
        sub.close();
        Ok(())
    }

    fn done(&self) -> bool {
        self.limit.is_some_and(|limit| self.printed >= limit)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_active(&self, handle: Option<ShutdownHandle>) {
        if let Ok(mut slot) = self.active.lock() {
            *slot = handle;
        }
    }

    fn pause(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(50)));
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>, active: ActiveStream) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        if let Ok(slot) = active.lock() {
            if let Some(handle) = slot.as_ref() {
                let _ = handle.shutdown();
            }
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
