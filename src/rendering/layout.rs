//! Word placement: a bit-packed occupancy grid searched along a
//! rectangular spiral.
//!
//! Each grid row is a run of `u32` blocks, most significant bit first, so a
//! sprite can be tested against the grid 32 pixels at a time.

use super::raster::Coverage;
use crate::shape::Mask;
use rand::Rng;

/// Coverage above this counts as ink when building sprites. Zero keeps
/// even faint anti-aliasing inside the reserved footprint.
const INK_THRESHOLD: u8 = 0;

pub struct OccupancyMap {
    width: u32,
    height: u32,
    stride: usize,
    bits: Vec<u32>,
}

impl OccupancyMap {
    pub fn new(width: u32, height: u32) -> Self {
        let stride = ((width + 31) >> 5) as usize;
        Self {
            width,
            height,
            stride,
            bits: vec![0; stride * height as usize],
        }
    }

    /// A map where every background pixel of `mask` is already taken.
    pub fn from_mask(mask: &Mask) -> Self {
        let mut map = Self::new(mask.width(), mask.height());
        for y in 0..mask.height() {
            for x in 0..mask.width() {
                if mask.is_background(x, y) {
                    map.set(x, y);
                }
            }
        }
        map
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn set(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            let idx = y as usize * self.stride + (x as usize >> 5);
            self.bits[idx] |= 1 << (31 - (x & 31));
        }
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        x < self.width
            && y < self.height
            && self.bits[y as usize * self.stride + (x as usize >> 5)] & (1 << (31 - (x & 31))) != 0
    }

    /// True when the sprite placed with its top-left at (`x`, `y`) would
    /// leave the canvas or overlap anything already placed.
    pub fn collides(&self, sprite: &Sprite, x: i32, y: i32) -> bool {
        if x < 0
            || y < 0
            || x as i64 + sprite.width as i64 > self.width as i64
            || y as i64 + sprite.height as i64 > self.height as i64
        {
            return true;
        }
        let mut hit = false;
        self.for_each_block(sprite, x as u32, y as u32, |grid, mask| {
            hit |= grid & mask != 0;
        });
        hit
    }

    /// Mark the sprite's pixels as taken.
    pub fn insert(&mut self, sprite: &Sprite, x: u32, y: u32) {
        let shift = x & 31;
        let first_block = (x >> 5) as usize;
        for sy in 0..sprite.height {
            let row = (y + sy) as usize * self.stride;
            let mut carry = 0u32;
            for k in 0..=sprite.blocks_per_row {
                let s_val = sprite.block(sy, k);
                let m = shifted(carry, s_val, shift);
                let gx = first_block + k;
                if m != 0 && gx < self.stride {
                    self.bits[row + gx] |= m;
                }
                carry = s_val;
            }
        }
    }

    fn for_each_block(&self, sprite: &Sprite, x: u32, y: u32, mut f: impl FnMut(u32, u32)) {
        let shift = x & 31;
        let first_block = (x >> 5) as usize;
        for sy in 0..sprite.height {
            let row = (y + sy) as usize * self.stride;
            let mut carry = 0u32;
            for k in 0..=sprite.blocks_per_row {
                let s_val = sprite.block(sy, k);
                let m = shifted(carry, s_val, shift);
                let gx = first_block + k;
                if m != 0 && gx < self.stride {
                    f(self.bits[row + gx], m);
                }
                carry = s_val;
            }
        }
    }
}

/// Low bits of the previous block followed by the current block, moved
/// right by `shift`.
fn shifted(carry: u32, current: u32, shift: u32) -> u32 {
    if shift == 0 {
        current
    } else {
        (carry << (32 - shift)) | (current >> shift)
    }
}

/// The footprint of one word, grown by `padding` pixels on every side
pub struct Sprite {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    blocks_per_row: usize,
    bits: Vec<u32>,
}

impl Sprite {
    pub fn from_coverage(coverage: &Coverage, padding: u32) -> Self {
        let width = coverage.width + padding * 2;
        let height = coverage.height + padding * 2;
        let blocks_per_row = ((width + 31) >> 5) as usize;
        let mut bits = vec![0u32; blocks_per_row * height as usize];
        let pad = padding as i64;

        for cy in 0..coverage.height {
            for cx in 0..coverage.width {
                if coverage.at(cx, cy) <= INK_THRESHOLD {
                    continue;
                }
                let (fx, fy) = (cx as i64 + pad, cy as i64 + pad);
                for py in -pad..=pad {
                    for px in -pad..=pad {
                        let (dx, dy) = (fx + px, fy + py);
                        if dx < 0 || dy < 0 || dx >= width as i64 || dy >= height as i64 {
                            continue;
                        }
                        let idx = dy as usize * blocks_per_row + (dx as usize >> 5);
                        bits[idx] |= 1 << (31 - (dx as u32 & 31));
                    }
                }
            }
        }

        Self {
            width,
            height,
            padding,
            blocks_per_row,
            bits,
        }
    }

    fn block(&self, row: u32, k: usize) -> u32 {
        if k < self.blocks_per_row {
            self.bits[row as usize * self.blocks_per_row + k]
        } else {
            0
        }
    }
}

/// Rectangular spiral of offsets around a start point.
struct Spiral {
    t: i64,
    dt: i64,
    x: f64,
    y: f64,
    step_x: f64,
    step_y: f64,
}

impl Spiral {
    fn new(width: u32, height: u32, clockwise: bool) -> Self {
        let step_y = 4.0;
        Self {
            t: 0,
            dt: if clockwise { 1 } else { -1 },
            x: 0.0,
            y: 0.0,
            step_x: step_y * width as f64 / height.max(1) as f64,
            step_y,
        }
    }
}

impl Iterator for Spiral {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        self.t += self.dt;
        let sign = if self.t < 0 { -1.0 } else { 1.0 };
        let leg = ((1.0 + 4.0 * sign * self.t as f64).sqrt() - sign) as i64 & 3;
        match leg {
            0 => self.x += self.step_x,
            1 => self.y += self.step_y,
            2 => self.x -= self.step_x,
            _ => self.y -= self.step_y,
        }
        Some((self.x as i32, self.y as i32))
    }
}

/// Steps needed for the spiral to sweep past every edge of the canvas.
fn spiral_budget(height: u32) -> usize {
    let legs = (height as usize * 3) / 4 + 4;
    legs * legs / 4 + legs
}

/// Find a free top-left position for `sprite`, starting near the centre.
pub fn find_position<R: Rng>(map: &OccupancyMap, sprite: &Sprite, rng: &mut R) -> Option<(u32, u32)> {
    let (w, h) = (map.width() as i32, map.height() as i32);
    if sprite.width as i32 > w || sprite.height as i32 > h {
        return None;
    }
    let jitter_x = (w / 8).max(1);
    let jitter_y = (h / 8).max(1);
    let cx = w / 2 + rng.random_range(-jitter_x..=jitter_x);
    let cy = h / 2 + rng.random_range(-jitter_y..=jitter_y);
    let half_w = sprite.width as i32 / 2;
    let half_h = sprite.height as i32 / 2;

    let start = std::iter::once((0, 0));
    let spiral = Spiral::new(map.width(), map.height(), rng.random_bool(0.5));
    for (dx, dy) in start.chain(spiral.take(spiral_budget(map.height()))) {
        let x = cx + dx - half_w;
        let y = cy + dy - half_h;
        if !map.collides(sprite, x, y) {
            return Some((x as u32, y as u32));
        }
    }
    None
}
