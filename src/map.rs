use anyhow::{anyhow, bail, Context, Result};
use std::fs;

use crate::common::Node;

/// Read-only directed graph the joint search runs over.
///
/// Edges are unit cost. Implementations must not report a node as its own
/// neighbor; waiting is modelled by the state space, not the graph.
pub trait BaseGraph {
    fn nodes(&self) -> Vec<Node>;
    fn neighbors(&self, node: Node) -> &[Node];
    fn contains(&self, node: Node) -> bool;
}

#[derive(Debug, Clone)]
pub struct Tile {
    passable: bool,
    pub neighbors: Vec<Node>, // Stores coordinates of accessible neighbors
}

impl Tile {
    pub fn is_passable(&self) -> bool {
        self.passable
    }
}

#[derive(Debug, Clone)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    pub grid: Vec<Vec<Tile>>,
}

impl Map {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("cannot read map file {path}"))?;
        Self::parse(&contents).with_context(|| format!("malformed map file {path}"))
    }

    /// Parses the MovingAI grid format: `type`, `height`, `width` and `map`
    /// header lines followed by `height` rows of tiles.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut lines = contents.lines();

        let _type = lines.next().ok_or_else(|| anyhow!("missing type line"))?;
        let height = header_value(lines.next(), "height")?;
        let width = header_value(lines.next(), "width")?;
        match lines.next() {
            Some(line) if line.trim() == "map" => {}
            other => bail!("expected `map` line, got {other:?}"),
        }

        let mut grid = Vec::with_capacity(height);
        for (row, line) in lines.take(height).enumerate() {
            let tiles_row: Vec<Tile> = line
                .chars()
                .take(width)
                .map(|ch| Tile {
                    passable: matches!(ch, '.' | 'G' | 'S'),
                    neighbors: Vec::new(),
                })
                .collect();
            if tiles_row.len() != width {
                bail!("row {row} has {} tiles, expected {width}", tiles_row.len());
            }
            grid.push(tiles_row);
        }
        if grid.len() != height {
            bail!("found {} rows, expected {height}", grid.len());
        }

        let mut map = Map {
            height,
            width,
            grid,
        };
        map.initialize_neighbors();
        Ok(map)
    }

    fn initialize_neighbors(&mut self) {
        for x in 0..self.height {
            for y in 0..self.width {
                if self.grid[x][y].passable {
                    self.grid[x][y].neighbors = self.get_neighbors(x, y);
                }
            }
        }
    }

    pub fn get_neighbors(&self, x: usize, y: usize) -> Vec<Node> {
        let directions = [(-1, 0), (1, 0), (0, -1), (0, 1)]; // Up, down, left, right
        let mut neighbors = Vec::new();

        for &(dx, dy) in &directions {
            let new_x = x as i64 + dx;
            let new_y = y as i64 + dy;
            if new_x >= 0
                && new_y >= 0
                && new_x < self.height as i64
                && new_y < self.width as i64
                && self.grid[new_x as usize][new_y as usize].passable
            {
                neighbors.push((new_x as usize, new_y as usize));
            }
        }

        neighbors
    }

    pub fn is_passable(&self, x: usize, y: usize) -> bool {
        x < self.height && y < self.width && self.grid[x][y].is_passable()
    }

    pub fn edge_count(&self) -> usize {
        self.grid
            .iter()
            .flatten()
            .map(|tile| tile.neighbors.len())
            .sum()
    }
}

impl BaseGraph for Map {
    fn nodes(&self) -> Vec<Node> {
        (0..self.height)
            .flat_map(|x| (0..self.width).map(move |y| (x, y)))
            .filter(|&(x, y)| self.grid[x][y].passable)
            .collect()
    }

    fn neighbors(&self, node: Node) -> &[Node] {
        if self.contains(node) {
            &self.grid[node.0][node.1].neighbors
        } else {
            &[]
        }
    }

    fn contains(&self, node: Node) -> bool {
        self.is_passable(node.0, node.1)
    }
}

fn header_value(line: Option<&str>, key: &str) -> Result<usize> {
    let line = line.ok_or_else(|| anyhow!("missing {key} line"))?;
    let mut parts = line.split_whitespace();
    if parts.next() != Some(key) {
        bail!("expected `{key}` header, got {line:?}");
    }
    parts
        .next()
        .ok_or_else(|| anyhow!("missing value for {key}"))?
        .parse::<usize>()
        .with_context(|| format!("invalid {key} value in {line:?}"))
}
