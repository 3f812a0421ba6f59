use serde::{Deserialize, Serialize};

use crate::noise::{FractalNoise, RidgeNoise, SeedCounter};
use crate::registry::{BlockId, TerrainBlocks};
use crate::tensor::Tensor3;

/// Dirt cells between the rock column and the surface tile.
const DIRT_DEPTH: i32 = 3;

/// Snow line parameters: snow appears where the blended height clears
/// `SNOW_LINE - SNOW_LINE_DROP * mountain`.
const SNOW_LINE: f64 = 72.0;
const SNOW_LINE_DROP: f64 = 8.0;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldConfig {
    pub sea_level: i32,
    pub island_radius: f64,
    pub cave_levels: u32,
    pub cave_radius: f64,
    pub cave_cutoff: f64,
    pub cave_height: f64,
    pub cave_delta_y: f64,
    pub cave_wave_radius: f64,
    pub cave_wave_height: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            sea_level: 64,
            island_radius: 1024.0,
            cave_levels: 3,
            cave_radius: 32.0,
            cave_cutoff: 0.35,
            cave_height: 6.0,
            cave_delta_y: 16.0,
            cave_wave_radius: 64.0,
            cave_wave_height: 16.0,
        }
    }
}

/// Write-only per-column output. `push` appends a run of `block` ending at
/// `top` (inclusive); tops must be non-decreasing across pushes.
/// `overwrite` replaces a single cell and is how the cave carver works.
pub trait ColumnSink {
    fn push(&mut self, block: BlockId, top: i32);
    fn overwrite(&mut self, block: BlockId, y: i32);
}

/// Sink adapter that writes one `(x, z)` column of a `Tensor3`. Cells
/// outside the tensor's vertical range are dropped.
pub struct TensorColumn<'a> {
    tensor: &'a mut Tensor3,
    x: usize,
    z: usize,
    top: i32,
}

impl<'a> TensorColumn<'a> {
    pub fn new(tensor: &'a mut Tensor3, x: usize, z: usize) -> Self {
        Self {
            tensor,
            x,
            z,
            top: -1,
        }
    }
}

impl ColumnSink for TensorColumn<'_> {
    fn push(&mut self, block: BlockId, top: i32) {
        assert!(
            top >= self.top,
            "column push out of order: {top} after {}",
            self.top
        );
        let sy = self.tensor.shape()[1] as i32;
        let lo = (self.top + 1).max(0);
        let hi = top.min(sy - 1);
        for y in lo..=hi {
            self.tensor.set(self.x, y as usize, self.z, block);
        }
        self.top = top;
    }

    fn overwrite(&mut self, block: BlockId, y: i32) {
        let sy = self.tensor.shape()[1] as i32;
        if (0..sy).contains(&y) {
            self.tensor.set(self.x, y as usize, self.z, block);
        }
    }
}

struct CaveLevel {
    carver: FractalNoise,
    wave: FractalNoise,
}

enum Relief {
    Ground,
    Cliff,
    Mountain(f64),
}

struct ColumnShape {
    surface: BlockId,
    height: i32,
    snow_depth: i32,
}

/// Deterministic per-column terrain. All fields derive from the seed
/// counter handed to the constructor, so two generators built from equal
/// counters emit identical worlds.
pub struct WorldGenerator {
    config: WorldConfig,
    blocks: TerrainBlocks,
    cliff_select: FractalNoise,
    mountain_select: FractalNoise,
    height_ground: FractalNoise,
    height_cliff: FractalNoise,
    ridge: RidgeNoise,
    caves: Vec<CaveLevel>,
}

impl WorldGenerator {
    pub fn new(config: WorldConfig, blocks: TerrainBlocks, counter: &mut SeedCounter) -> Self {
        let cliff_select = FractalNoise::new(counter, 0.0, 1.0, 512.0, 2, 0.5, 2.0);
        let mountain_select = FractalNoise::new(counter, 0.0, 1.0, 512.0, 2, 0.5, 2.0);
        let height_ground = FractalNoise::new(counter, 4.0, 12.0, 96.0, 4, 0.5, 2.0);
        let height_cliff = FractalNoise::new(counter, 24.0, 16.0, 96.0, 2, 0.5, 2.0);
        let ridge = RidgeNoise::new(counter, 4, 0.6, 1.0 / 256.0);
        let caves = (0..config.cave_levels)
            .map(|_| CaveLevel {
                carver: FractalNoise::new(counter, 0.0, 1.0, config.cave_radius, 1, 0.5, 2.0),
                wave: FractalNoise::new(counter, 0.0, 1.0, config.cave_wave_radius, 1, 0.5, 2.0),
            })
            .collect();

        Self {
            config,
            blocks,
            cliff_select,
            mountain_select,
            height_ground,
            height_cliff,
            ridge,
            caves,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn blocks(&self) -> &TerrainBlocks {
        &self.blocks
    }

    fn island_falloff(&self, x: f64, z: f64) -> f64 {
        let base = (x * x + z * z).sqrt() / self.config.island_radius;
        16.0 * base * base
    }

    fn column_shape(&self, x: i32, z: i32) -> Option<ColumnShape> {
        let xf = f64::from(x);
        let zf = f64::from(z);
        let sea = self.config.sea_level;

        let falloff = self.island_falloff(xf, zf);
        if falloff >= f64::from(sea) {
            return None;
        }

        let cliff_select = self.cliff_select.sample(xf, zf);
        let mountain_select = self.mountain_select.sample(xf, zf);
        let cliff_x = (16.0 * cliff_select.abs() - 4.0).clamp(0.0, 1.0);
        let mountain_x = (8.0 * mountain_select).max(0.0).sqrt();
        let cliff = cliff_x - mountain_x;
        let mountain = -cliff;

        let height_ground = self.height_ground.sample(xf, zf);
        let mut height = height_ground;
        let mut relief = Relief::Ground;

        if mountain > 0.0 {
            let ridge = self.ridge.sample(xf, zf);
            let height_mountain = height_ground + 64.0 * (ridge - 1.25).max(0.0).powf(1.5);
            if height_mountain > height_ground {
                let blend = mountain.min(1.0);
                height = height_ground + (height_mountain - height_ground) * blend;
                relief = Relief::Mountain(blend);
            }
        } else if cliff > 0.0 {
            let height_cliff = self.height_cliff.sample(xf, zf);
            if height_cliff > height_ground {
                height = height_ground + (height_cliff - height_ground) * cliff.min(1.0);
                relief = Relief::Cliff;
            }
        }

        let truncated = (height - falloff).trunc();
        let height_abs = truncated as i32 + sea;
        let blocks = &self.blocks;

        let (surface, snow_depth) = if truncated < -1.0 {
            (blocks.dirt, 0)
        } else {
            match relief {
                Relief::Mountain(blend) => {
                    let snow = height - (SNOW_LINE - SNOW_LINE_DROP * blend);
                    if snow > 0.0 {
                        (blocks.snow, (snow.ceil() as i32).max(1))
                    } else {
                        (blocks.rock, 0)
                    }
                }
                Relief::Cliff => (blocks.dirt, 0),
                Relief::Ground => {
                    if truncated < 1.0 {
                        (blocks.sand, 0)
                    } else {
                        (blocks.grass, 0)
                    }
                }
            }
        };

        Some(ColumnShape {
            surface,
            height: height_abs,
            snow_depth,
        })
    }

    /// Emit the full block stack for the column at world `(x, z)`.
    pub fn load_column(&self, x: i32, z: i32, sink: &mut impl ColumnSink) {
        let Some(shape) = self.column_shape(x, z) else {
            return;
        };

        let blocks = &self.blocks;
        let sea = self.config.sea_level;
        let height = shape.height;

        if shape.surface == blocks.rock {
            sink.push(blocks.rock, height);
        } else if shape.snow_depth > 0 {
            sink.push(blocks.rock, height - shape.snow_depth);
            sink.push(blocks.snow, height);
        } else if shape.surface == blocks.dirt {
            sink.push(blocks.rock, height - 1 - DIRT_DEPTH);
            sink.push(blocks.dirt, height);
        } else {
            sink.push(blocks.rock, height - 1 - DIRT_DEPTH);
            sink.push(blocks.dirt, height - 1);
            sink.push(shape.surface, height);
        }

        if height < sea {
            sink.push(blocks.water, sea);
        }

        if shape.surface == blocks.grass && has_tree(x, z) {
            sink.push(blocks.leaves, height + 1);
        }

        self.carve_caves(x, z, sink);
    }

    /// Far-LOD variant: only the surface tile and the water plane.
    pub fn frontier_cell(&self, x: i32, z: i32) -> (BlockId, i32) {
        let Some(shape) = self.column_shape(x, z) else {
            return (self.blocks.empty, 0);
        };
        let sea = self.config.sea_level;
        if shape.height < sea {
            (self.blocks.water, sea)
        } else {
            (shape.surface, shape.height)
        }
    }

    fn carve_caves(&self, x: i32, z: i32, sink: &mut impl ColumnSink) {
        let xf = f64::from(x);
        let zf = f64::from(z);
        let config = &self.config;
        let levels = self.caves.len();

        for (i, level) in self.caves.iter().enumerate() {
            let carver = level.carver.sample(xf, zf);
            if carver <= config.cave_cutoff {
                continue;
            }

            let dy = f64::from(config.sea_level)
                - config.cave_delta_y * (levels as f64 - 1.0) / 2.0
                + i as f64 * config.cave_delta_y;
            let wave = level.wave.sample(xf, zf);
            let offset = (dy + config.cave_wave_height * wave).floor() as i32;
            let blocks = ((carver - config.cave_cutoff) * config.cave_height).floor() as i32;

            for y in (offset - blocks)..=(offset + blocks + 2) {
                sink.overwrite(self.blocks.empty, y);
            }
        }
    }
}

/// Hash-based tree mask, roughly one column in sixteen. The 15-bit axis
/// masks make placement repeat with period 32768 along each horizontal
/// axis.
pub fn has_tree(x: i32, z: i32) -> bool {
    let key = (((x & 0x7fff) as u32) << 15) | ((z & 0x7fff) as u32);
    let mut hash: u32 = 0x811c_9dc5;
    for byte in key.to_le_bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    (hash & 63) <= 3
}

#[cfg(test)]
mod tests {
    use super::{has_tree, ColumnSink, TensorColumn, WorldConfig, WorldGenerator};
    use crate::noise::SeedCounter;
    use crate::registry::{register_default_blocks, BlockId, Registry, TerrainBlocks};
    use crate::tensor::Tensor3;

    #[derive(Default)]
    struct RecordingColumn {
        pushes: Vec<(BlockId, i32)>,
        overwrites: Vec<(BlockId, i32)>,
    }

    impl ColumnSink for RecordingColumn {
        fn push(&mut self, block: BlockId, top: i32) {
            if let Some(&(_, last)) = self.pushes.last() {
                assert!(top >= last, "column push out of order: {top} after {last}");
            }
            self.pushes.push((block, top));
        }

        fn overwrite(&mut self, block: BlockId, y: i32) {
            self.overwrites.push((block, y));
        }
    }

    fn test_generator(seed: u32) -> (WorldGenerator, TerrainBlocks) {
        let mut registry = Registry::new();
        let blocks = register_default_blocks(&mut registry);
        let mut counter = SeedCounter::new(seed);
        (
            WorldGenerator::new(WorldConfig::default(), blocks, &mut counter),
            blocks,
        )
    }

    #[test]
    fn far_columns_outside_the_island_are_empty() {
        let (generator, _) = test_generator(42);
        let mut column = RecordingColumn::default();
        generator.load_column(10_000, 10_000, &mut column);
        assert!(column.pushes.is_empty());
        assert!(column.overwrites.is_empty());
    }

    #[test]
    fn island_center_produces_a_layered_column() {
        let (generator, blocks) = test_generator(42);
        let mut column = RecordingColumn::default();
        generator.load_column(0, 0, &mut column);

        assert!(!column.pushes.is_empty());
        // Rock always forms the base of a non-empty column.
        assert_eq!(column.pushes[0].0, blocks.rock);

        // The column either reaches the sea with water on top, or rises
        // above it with a dry surface tile.
        let sea = generator.config().sea_level;
        let &(top_block, top) = column.pushes.last().unwrap();
        if top_block == blocks.water {
            assert_eq!(top, sea);
        } else {
            assert!(top >= sea);
        }
    }

    #[test]
    fn generation_is_deterministic_for_a_fixed_seed() {
        let (generator_a, _) = test_generator(777);
        let (generator_b, _) = test_generator(777);

        for &(x, z) in &[(0, 0), (33, -70), (-400, 512), (911, 911)] {
            let mut a = RecordingColumn::default();
            let mut b = RecordingColumn::default();
            generator_a.load_column(x, z, &mut a);
            generator_b.load_column(x, z, &mut b);
            assert_eq!(a.pushes, b.pushes);
            assert_eq!(a.overwrites, b.overwrites);
        }
    }

    #[test]
    fn distinct_seeds_disagree_somewhere() {
        let (generator_a, _) = test_generator(1);
        let (generator_b, _) = test_generator(2);

        let mut differs = false;
        for x in (-256..256).step_by(37) {
            for z in (-256..256).step_by(41) {
                let mut a = RecordingColumn::default();
                let mut b = RecordingColumn::default();
                generator_a.load_column(x, z, &mut a);
                generator_b.load_column(x, z, &mut b);
                if a.pushes != b.pushes {
                    differs = true;
                }
            }
        }
        assert!(differs);
    }

    #[test]
    fn cave_carver_overwrites_runs_of_empty() {
        let mut registry = Registry::new();
        let blocks = register_default_blocks(&mut registry);

        // A cutoff below the noise floor forces every level to carve.
        let config = WorldConfig {
            cave_cutoff: -2.0,
            ..WorldConfig::default()
        };
        let mut counter = SeedCounter::new(9);
        let generator = WorldGenerator::new(config, blocks, &mut counter);

        let mut column = RecordingColumn::default();
        generator.load_column(12, -7, &mut column);

        assert!(!column.overwrites.is_empty());
        for &(block, _) in &column.overwrites {
            assert_eq!(block, blocks.empty);
        }
        // carver > cutoff by at least 1 means each level clears a band of
        // at least 2·blocks + 3 cells.
        assert!(column.overwrites.len() >= 3 * 3);
    }

    #[test]
    fn frontier_matches_surface_or_sea_plane() {
        let (generator, blocks) = test_generator(42);
        let sea = generator.config().sea_level;

        let (far_block, far_height) = generator.frontier_cell(10_000, 10_000);
        assert_eq!(far_block, blocks.empty);
        assert_eq!(far_height, 0);

        for &(x, z) in &[(0, 0), (100, 250), (-300, 80)] {
            let (block, height) = generator.frontier_cell(x, z);
            if block == blocks.water {
                assert_eq!(height, sea);
            } else {
                assert!(height >= sea - 1);

                let mut column = RecordingColumn::default();
                generator.load_column(x, z, &mut column);
                let surface = column
                    .pushes
                    .iter()
                    .find(|&&(_, top)| top == height)
                    .map(|&(block, _)| block);
                assert_eq!(surface, Some(block));
            }
        }
    }

    #[test]
    fn tree_hash_density_is_about_one_in_sixteen() {
        let mut count = 0;
        for x in 0..64 {
            for z in 0..64 {
                if has_tree(x, z) {
                    count += 1;
                }
            }
        }
        // 6.25% of 4096 is 256; allow generous slack for hash clumping.
        assert!((100..500).contains(&count), "tree count {count}");
    }

    #[test]
    fn tree_hash_wraps_at_the_15_bit_axis_mask() {
        for &(x, z) in &[(0, 0), (5, 9), (1000, 31_000)] {
            assert_eq!(has_tree(x, z), has_tree(x + 32_768, z));
            assert_eq!(has_tree(x, z), has_tree(x, z + 32_768));
        }
    }

    #[test]
    fn tensor_column_clamps_to_the_tensor_and_enforces_order() {
        let mut tensor = Tensor3::new(4, 8, 4);
        {
            let mut column = TensorColumn::new(&mut tensor, 1, 2);
            column.push(BlockId(1), 3);
            column.push(BlockId(2), 5);
            column.push(BlockId(3), 20); // clipped to the top of the tensor
            column.overwrite(BlockId::EMPTY, 4);
            column.overwrite(BlockId(9), -5); // dropped
        }

        for y in 0..=3 {
            assert_eq!(tensor.get(1, y, 2), BlockId(1));
        }
        assert_eq!(tensor.get(1, 5, 2), BlockId(2));
        assert_eq!(tensor.get(1, 4, 2), BlockId::EMPTY);
        assert_eq!(tensor.get(1, 6, 2), BlockId(3));
        assert_eq!(tensor.get(1, 7, 2), BlockId(3));
        // Untouched neighbor column.
        assert_eq!(tensor.get(0, 0, 0), BlockId::EMPTY);
    }

    #[test]
    #[should_panic(expected = "column push out of order")]
    fn out_of_order_push_panics() {
        let mut tensor = Tensor3::new(2, 8, 2);
        let mut column = TensorColumn::new(&mut tensor, 0, 0);
        column.push(BlockId(1), 5);
        column.push(BlockId(2), 3);
    }
}
