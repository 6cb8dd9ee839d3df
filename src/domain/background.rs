//! Modelo de fondo adaptativo por píxel con mezcla de gaussianas (MOG2 de
//! Zivkovic) y detección de sombras. Cada píxel guarda hasta `max_modes`
//! gaussianas RGB de varianza isótropa, ordenadas por peso.

use image::RgbImage;
use ndarray::Array2;

pub const DEFAULT_HISTORY: u32 = 500;
pub const DEFAULT_VAR_THRESHOLD: f32 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    Background,
    Shadow,
    Foreground,
}

impl PixelClass {
    /// Las sombras cuentan como movimiento: las proyecta lo que se mueve.
    pub fn is_moving(self) -> bool {
        !matches!(self, PixelClass::Background)
    }
}

/// Clasificación por píxel de un frame, indexada `[[fila, columna]]`.
pub type ForegroundMask = Array2<PixelClass>;

#[derive(Debug, Clone)]
pub struct BackgroundParams {
    /// Frames en los que el modelo olvida.
    pub history: u32,
    /// Distancia de Mahalanobis al cuadrado por debajo de la cual un píxel es fondo.
    pub var_threshold: f32,
    pub detect_shadows: bool,
    pub max_modes: usize,
    /// Peso acumulado de los modos que forman el fondo.
    pub background_ratio: f32,
    /// Distancia al cuadrado por debajo de la cual una muestra actualiza un modo existente.
    pub var_threshold_gen: f32,
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    pub complexity_reduction: f32,
    /// Cuánto puede oscurecer una sombra el color del fondo.
    pub shadow_tau: f32,
}

impl Default for BackgroundParams {
    fn default() -> Self {
        Self {
            history: DEFAULT_HISTORY,
            var_threshold: DEFAULT_VAR_THRESHOLD,
            detect_shadows: true,
            max_modes: 5,
            background_ratio: 0.9,
            var_threshold_gen: 9.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_reduction: 0.05,
            shadow_tau: 0.5,
        }
    }
}

/// Modos de un único píxel.
struct Modes<'a> {
    weights: &'a mut [f32],
    variances: &'a mut [f32],
    means: &'a mut [[f32; 3]],
}

impl Modes<'_> {
    fn swap(&mut self, a: usize, b: usize) {
        self.weights.swap(a, b);
        self.variances.swap(a, b);
        self.means.swap(a, b);
    }
}

pub struct BackgroundModel {
    params: BackgroundParams,
    width: u32,
    height: u32,
    frames_seen: u32,
    modes_used: Vec<u8>,
    weights: Vec<f32>,
    variances: Vec<f32>,
    means: Vec<[f32; 3]>,
}

impl BackgroundModel {
    pub fn new(mut params: BackgroundParams) -> Self {
        params.max_modes = params.max_modes.clamp(1, u8::MAX as usize);
        params.history = params.history.max(1);
        Self {
            params,
            width: 0,
            height: 0,
            frames_seen: 0,
            modes_used: Vec::new(),
            weights: Vec::new(),
            variances: Vec::new(),
            means: Vec::new(),
        }
    }

    /// Frames absorbidos desde la última (re)inicialización.
    pub fn frames_seen(&self) -> u32 {
        self.frames_seen
    }

    /// Aprende de `frame` y devuelve su clasificación. Un cambio de
    /// resolución reinicia el modelo.
    pub fn apply(&mut self, frame: &RgbImage) -> ForegroundMask {
        let (width, height) = frame.dimensions();
        if width != self.width || height != self.height {
            self.reset(width, height);
        }

        self.frames_seen = self.frames_seen.saturating_add(1);
        let window = self.frames_seen.saturating_mul(2).min(self.params.history);
        let alpha = 1.0 / window as f32;

        let mut mask = ForegroundMask::from_elem((height as usize, width as usize), PixelClass::Background);
        for (x, y, px) in frame.enumerate_pixels() {
            let data = [px[0] as f32, px[1] as f32, px[2] as f32];
            let pixel = y as usize * width as usize + x as usize;
            mask[[y as usize, x as usize]] = self.update_pixel(pixel, data, alpha);
        }
        mask
    }

    fn reset(&mut self, width: u32, height: u32) {
        let pixels = width as usize * height as usize;
        let slots = pixels * self.params.max_modes;
        self.width = width;
        self.height = height;
        self.frames_seen = 0;
        self.modes_used = vec![0; pixels];
        self.weights = vec![0.0; slots];
        self.variances = vec![0.0; slots];
        self.means = vec![[0.0; 3]; slots];
    }

    fn update_pixel(&mut self, pixel: usize, data: [f32; 3], alpha: f32) -> PixelClass {
        let p = &self.params;
        let k = p.max_modes;
        let slots = pixel * k..(pixel + 1) * k;
        let mut modes = Modes {
            weights: &mut self.weights[slots.clone()],
            variances: &mut self.variances[slots.clone()],
            means: &mut self.means[slots],
        };

        let keep = 1.0 - alpha;
        let prune = -alpha * p.complexity_reduction;
        let mut n_modes = self.modes_used[pixel] as usize;
        let mut background = false;
        let mut fits = false;
        let mut total_weight = 0.0_f32;

        let mut mode = 0;
        while mode < n_modes {
            let mut weight = keep * modes.weights[mode] + prune;
            let mut swaps = 0;

            if !fits {
                let var = modes.variances[mode];
                let mean = modes.means[mode];
                let diff = [mean[0] - data[0], mean[1] - data[1], mean[2] - data[2]];
                let dist2 = diff.iter().map(|d| d * d).sum::<f32>();

                if total_weight < p.background_ratio && dist2 < p.var_threshold * var {
                    background = true;
                }

                if dist2 < p.var_threshold_gen * var {
                    fits = true;
                    weight += alpha;
                    let rate = alpha / weight;
                    for (m, d) in modes.means[mode].iter_mut().zip(diff) {
                        *m -= rate * d;
                    }
                    modes.variances[mode] = (var + rate * (dist2 - var)).clamp(p.var_min, p.var_max);

                    // subir el modo actualizado hasta su posición por peso
                    let mut i = mode;
                    while i > 0 && weight >= modes.weights[i - 1] {
                        modes.swap(i, i - 1);
                        swaps += 1;
                        i -= 1;
                    }
                }
            }

            if weight < -prune {
                weight = 0.0;
                n_modes -= 1;
            }
            modes.weights[mode - swaps] = weight;
            total_weight += weight;
            mode += 1;
        }

        if total_weight > 0.0 {
            for w in modes.weights[..n_modes].iter_mut() {
                *w /= total_weight;
            }
        }

        if !fits {
            let slot = if n_modes == k {
                k - 1
            } else {
                n_modes += 1;
                n_modes - 1
            };

            if n_modes == 1 {
                modes.weights[slot] = 1.0;
            } else {
                modes.weights[slot] = alpha;
                for w in modes.weights[..n_modes - 1].iter_mut() {
                    *w *= keep;
                }
            }
            modes.means[slot] = data;
            modes.variances[slot] = p.var_init;

            let mut i = n_modes - 1;
            while i > 0 && alpha >= modes.weights[i - 1] {
                modes.swap(i, i - 1);
                i -= 1;
            }
        }

        self.modes_used[pixel] = n_modes as u8;

        if background {
            PixelClass::Background
        } else if p.detect_shadows && is_shadow(&modes, n_modes, data, p) {
            PixelClass::Shadow
        } else {
            PixelClass::Foreground
        }
    }
}

impl Default for BackgroundModel {
    fn default() -> Self {
        Self::new(BackgroundParams::default())
    }
}

/// Una sombra es una versión uniformemente más oscura de un modo de fondo.
fn is_shadow(modes: &Modes<'_>, n_modes: usize, data: [f32; 3], p: &BackgroundParams) -> bool {
    let mut weight_seen = 0.0_f32;
    for mode in 0..n_modes {
        let mean = modes.means[mode];
        let var = modes.variances[mode];

        let numerator: f32 = mean.iter().zip(data).map(|(m, d)| m * d).sum();
        let denominator: f32 = mean.iter().map(|m| m * m).sum();
        if denominator == 0.0 {
            return false;
        }

        if numerator <= denominator && numerator >= p.shadow_tau * denominator {
            let a = numerator / denominator;
            let dist2a: f32 = mean.iter().zip(data).map(|(m, d)| (a * m - d).powi(2)).sum();
            if dist2a < p.var_threshold * var * a * a {
                return true;
            }
        }

        weight_seen += modes.weights[mode];
        if weight_seen > p.background_ratio {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn flat(w: u32, h: u32, v: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    fn count(mask: &ForegroundMask, class: PixelClass) -> usize {
        mask.iter().filter(|&&c| c == class).count()
    }

    #[test]
    fn static_scene_becomes_background() {
        let mut model = BackgroundModel::default();
        let frame = flat(16, 12, 100);
        model.apply(&frame);
        let mask = model.apply(&frame);
        assert_eq!(mask.dim(), (12, 16));
        assert_eq!(count(&mask, PixelClass::Background), 16 * 12);
    }

    #[test]
    fn bright_object_is_foreground() {
        let mut model = BackgroundModel::default();
        let bg = flat(20, 20, 100);
        for _ in 0..10 {
            model.apply(&bg);
        }

        let mut frame = bg.clone();
        for y in 5..10 {
            for x in 5..10 {
                frame.put_pixel(x, y, Rgb([230, 230, 230]));
            }
        }
        let mask = model.apply(&frame);

        assert_eq!(count(&mask, PixelClass::Foreground), 25);
        assert_eq!(mask[[7, 7]], PixelClass::Foreground);
        assert_eq!(mask[[0, 0]], PixelClass::Background);
    }

    #[test]
    fn darker_background_is_shadow() {
        let mut model = BackgroundModel::default();
        let bg = flat(8, 8, 200);
        for _ in 0..10 {
            model.apply(&bg);
        }
        let mask = model.apply(&flat(8, 8, 140));
        assert_eq!(count(&mask, PixelClass::Shadow), 64);

        let mut no_shadows = BackgroundModel::new(BackgroundParams {
            detect_shadows: false,
            ..Default::default()
        });
        for _ in 0..10 {
            no_shadows.apply(&bg);
        }
        let mask = no_shadows.apply(&flat(8, 8, 140));
        assert_eq!(count(&mask, PixelClass::Foreground), 64);
    }

    #[test]
    fn resolution_change_restarts_model() {
        let mut model = BackgroundModel::default();
        model.apply(&flat(8, 8, 50));
        model.apply(&flat(8, 8, 50));
        assert_eq!(model.frames_seen(), 2);
        let mask = model.apply(&flat(4, 6, 50));
        assert_eq!(model.frames_seen(), 1);
        assert_eq!(mask.dim(), (6, 4));
    }

    #[test]
    fn repeated_change_is_absorbed() {
        let mut model = BackgroundModel::default();
        for _ in 0..5 {
            model.apply(&flat(6, 6, 40));
        }
        let moved = flat(6, 6, 220);
        let first = model.apply(&moved);
        assert_eq!(count(&first, PixelClass::Foreground), 36);
        let mut last = first;
        for _ in 0..200 {
            last = model.apply(&moved);
        }
        assert_eq!(count(&last, PixelClass::Background), 36);
    }
}
