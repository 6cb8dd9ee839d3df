use async_trait::async_trait;
use chrono::Local;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::application::context::MonitoringContext;
use crate::application::ports::{
    AlertNotifierPort, DetectorFactory, DetectorPort, FrameSourceFactory, FrameSourcePort, MonitorPort,
};
use crate::application::scheduler::Scheduler;
use crate::domain::{
    alerts::ALERT_CAPACITY,
    config::MonitorConfig,
    detection::BoundingBox,
    errors::{DomainError, DomainResult},
    stream::{FrameMeta, MonitorSnapshot},
};

/// Techo de la espera entre lecturas fallidas.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);
/// Con fallos seguidos, como mucho un aviso por intervalo.
const FAILURE_WARN_INTERVAL: Duration = Duration::from_secs(10);
/// Cada cuánto mira la parada una espera de reintento.
const STOP_POLL: Duration = Duration::from_millis(50);
const PREVIEW_JPEG_QUALITY: u8 = 80;
const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: usize = 3;

type FrameSlot = Option<Arc<RgbImage>>;

/// Runtime del monitoreo: un hilo de adquisición que deja siempre el último
/// frame en un slot, y un hilo de proceso que, a ritmo fijo, detecta,
/// clasifica y alerta sobre ese frame.
pub struct PipelineAdapter {
    sources: Arc<dyn FrameSourceFactory>,
    detectors: Arc<dyn DetectorFactory>,
    announcer: Arc<dyn AlertNotifierPort>,
    tx: broadcast::Sender<(FrameMeta, Vec<u8>)>,
    status: Arc<watch::Sender<MonitorSnapshot>>,
    session: Mutex<Option<Session>>,
}

struct Session {
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl PipelineAdapter {
    pub fn new(
        sources: Arc<dyn FrameSourceFactory>,
        detectors: Arc<dyn DetectorFactory>,
        announcer: Arc<dyn AlertNotifierPort>,
    ) -> Self {
        let (tx, _) = broadcast::channel(16);
        let (status, _) = watch::channel(MonitorSnapshot::default());

        Self {
            sources,
            detectors,
            announcer,
            tx,
            status: Arc::new(status),
            session: Mutex::new(None),
        }
    }
}

#[async_trait]
impl MonitorPort for PipelineAdapter {
    async fn start(&self, config: MonitorConfig) -> DomainResult<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(DomainError::InvalidInput("El monitoreo ya está activo".into()));
        }

        // Abrir cámara y modelo fuera del runtime: ambas operaciones bloquean.
        let sources = self.sources.clone();
        let detectors = self.detectors.clone();
        let camera = config.camera.clone();
        let detection = config.detection.clone();
        let (source, detector) = tokio::task::spawn_blocking(move || -> DomainResult<_> {
            let source = sources.open(&camera)?;
            let detector = detectors.load(&detection)?;
            Ok((source, detector))
        })
        .await
        .map_err(|e| DomainError::OperationFailed(format!("arranque abortado: {e}")))??;

        let source_name = source.describe();
        self.status.send_replace(MonitorSnapshot {
            running: true,
            source: Some(source_name.clone()),
            started_at: Some(Local::now()),
            confidence_threshold: config.detection.confidence_threshold,
            motion_sensitivity: config.detection.motion_sensitivity,
            ..Default::default()
        });

        let stop = Arc::new(AtomicBool::new(false));
        let (slot_tx, slot_rx) = watch::channel::<FrameSlot>(None);

        let acquisition = {
            let stop = stop.clone();
            let status = self.status.clone();
            let backoff = RetryBackoff::new(Scheduler::new(config.detection.tick_hz).tick_budget(), MAX_RETRY_BACKOFF);
            std::thread::spawn(move || acquire(source, slot_tx, backoff, &stop, &status))
        };

        let worker = Worker {
            detector,
            frames: slot_rx,
            context: MonitoringContext::new(config.alerts.cooldown()),
            notifier: config.alerts.sound_enabled.then(|| self.announcer.clone()),
            tx: self.tx.clone(),
            status: self.status.clone(),
            started: Instant::now(),
        };
        let processing = {
            let stop = stop.clone();
            let tick_hz = config.detection.tick_hz;
            std::thread::spawn(move || worker.run(tick_hz, &stop))
        };

        info!("▶️ Monitoreo iniciado: {} a {} Hz", source_name, config.detection.tick_hz);
        *session = Some(Session { stop, workers: vec![acquisition, processing] });
        Ok(())
    }

    async fn stop(&self) -> DomainResult<()> {
        let mut session = self.session.lock().await;
        let Some(Session { stop, workers }) = session.take() else {
            return Ok(());
        };

        stop.store(true, Ordering::Relaxed);
        tokio::task::spawn_blocking(move || {
            for worker in workers {
                if worker.join().is_err() {
                    error!("❌ Un hilo del pipeline terminó con pánico");
                }
            }
        })
        .await
        .map_err(|e| DomainError::OperationFailed(format!("parada abortada: {e}")))?;

        self.status.send_modify(|s| s.running = false);
        info!("⏹️ Monitoreo detenido");
        Ok(())
    }

    async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    async fn snapshot(&self) -> DomainResult<MonitorSnapshot> {
        Ok(self.status.borrow().clone())
    }

    async fn subscribe(&self) -> DomainResult<broadcast::Receiver<(FrameMeta, Vec<u8>)>> {
        Ok(self.tx.subscribe())
    }
}

/// Espera exponencial entre lecturas fallidas: empieza en `initial`, se
/// duplica hasta `max` y vuelve a empezar con el primer frame bueno.
struct RetryBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    streak: u64,
    last_warn: Option<Instant>,
}

impl RetryBackoff {
    fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1)).min(max);
        Self { initial, max, current: initial, streak: 0, last_warn: None }
    }

    /// Registra un fallo y devuelve la espera antes del siguiente intento.
    fn fail(&mut self) -> Duration {
        self.streak += 1;
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Cierra la racha de fallos y devuelve su longitud.
    fn succeed(&mut self) -> u64 {
        self.current = self.initial;
        self.last_warn = None;
        std::mem::take(&mut self.streak)
    }

    /// El primer fallo de una racha siempre avisa; el resto, uno por intervalo.
    fn should_warn(&mut self) -> bool {
        let due = self.last_warn.map_or(true, |t| t.elapsed() >= FAILURE_WARN_INTERVAL);
        if due {
            self.last_warn = Some(Instant::now());
        }
        due
    }
}

/// Lee frames sin pausa y deja sólo el último en el slot. Tras un fallo
/// espera según `backoff` antes de volver a leer.
fn acquire(
    mut source: Box<dyn FrameSourcePort>,
    slot: watch::Sender<FrameSlot>,
    mut backoff: RetryBackoff,
    stop: &AtomicBool,
    status: &watch::Sender<MonitorSnapshot>,
) {
    while !stop.load(Ordering::Relaxed) {
        match source.next_frame() {
            Ok(frame) => {
                let failed = backoff.succeed();
                if failed > 0 {
                    info!("✅ {} recuperada tras {} lecturas fallidas", source.describe(), failed);
                }
                slot.send_replace(Some(Arc::new(frame)));
            }
            Err(e) => {
                status.send_modify(|s| s.frame_failures += 1);
                let delay = backoff.fail();
                if backoff.should_warn() {
                    warn!("⚠️ Error capturando frame ({} seguidos, reintento en {:?}): {}", backoff.streak, delay, e);
                } else {
                    debug!("Error capturando frame ({} seguidos): {}", backoff.streak, e);
                }
                sleep_unless_stopped(delay, stop);
            }
        }
    }
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep((deadline - now).min(STOP_POLL));
    }
}

struct Worker {
    detector: Box<dyn DetectorPort>,
    frames: watch::Receiver<FrameSlot>,
    context: MonitoringContext,
    notifier: Option<Arc<dyn AlertNotifierPort>>,
    tx: broadcast::Sender<(FrameMeta, Vec<u8>)>,
    status: Arc<watch::Sender<MonitorSnapshot>>,
    started: Instant,
}

impl Worker {
    fn run(mut self, tick_hz: u32, stop: &AtomicBool) {
        let mut scheduler = Scheduler::new(tick_hz);
        let mut fps_est: f32 = 0.0;
        let mut last_t = Instant::now();

        scheduler.run(stop, |metrics| {
            // Sin frame nuevo no hay tick: el modelo de fondo no debe ver duplicados.
            let frame = match self.frames.has_changed() {
                Ok(true) => self.frames.borrow_and_update().clone(),
                _ => None,
            };
            let Some(frame) = frame else {
                self.status.send_modify(|s| s.metrics = metrics);
                return;
            };

            let t_infer_start = Instant::now();
            let detection = self.detector.detect(&frame);
            let infer_ms = t_infer_start.elapsed().as_secs_f32() * 1000.0;

            let boxes: Vec<BoundingBox> = match &detection {
                Ok(d) if d.presence => d.boxes.clone(),
                _ => Vec::new(),
            };
            let report = self.context.tick(Some(&frame), detection);

            if let (Some(alert), Some(notifier)) = (&report.alert, &self.notifier) {
                notifier.notify(alert);
            }

            let dt = last_t.elapsed().as_secs_f32().max(0.001);
            last_t = Instant::now();
            fps_est = 0.9 * fps_est + 0.1 * (1.0 / dt);

            let ctx = &self.context;
            let uptime_secs = self.started.elapsed().as_secs();
            self.status.send_modify(|s| {
                s.frame_count = ctx.frame_count();
                s.detector_failures = ctx.detector_failures();
                s.alert_count = ctx.alert_count();
                s.alerts = ctx.recent_alerts(ALERT_CAPACITY);
                s.latest = Some(report.clone());
                s.metrics = metrics;
                s.uptime_secs = uptime_secs;
                s.last_update = Some(Local::now());
            });

            if self.tx.receiver_count() > 0 {
                let mut preview = (*frame).clone();
                draw_boxes(&mut preview, &boxes);
                match encode_jpeg(&preview) {
                    Ok(jpeg) => {
                        let meta = FrameMeta {
                            width: frame.width(),
                            height: frame.height(),
                            infer_ms,
                            fps_est,
                            boxes,
                            report,
                        };
                        let _ = self.tx.send((meta, jpeg));
                    }
                    Err(e) => warn!("No se pudo comprimir la vista previa: {}", e),
                }
            }
        });
    }
}

/// Contorno de cada caja, recortado a la imagen.
fn draw_boxes(img: &mut RgbImage, boxes: &[BoundingBox]) {
    let (cols, rows) = (img.width() as usize, img.height() as usize);
    for b in boxes {
        let Some((x0, y0, x1, y1)) = b.clip(cols, rows) else { continue };
        for y in y0..y1 {
            for x in x0..x1 {
                let on_edge = x < x0 + BOX_THICKNESS
                    || x + BOX_THICKNESS >= x1
                    || y < y0 + BOX_THICKNESS
                    || y + BOX_THICKNESS >= y1;
                if on_edge {
                    img.put_pixel(x as u32, y as u32, BOX_COLOR);
                }
            }
        }
    }
}

fn encode_jpeg(img: &RgbImage) -> anyhow::Result<Vec<u8>> {
    let mut jpeg = Vec::new();
    let mut enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, PREVIEW_JPEG_QUALITY);
    enc.encode(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgb8)?;
    Ok(jpeg)
}
