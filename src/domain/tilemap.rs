// Tile map loading and blocked-tile queries.
//
// The serialization within this layer is a dependency leak, but the map is a domain resource
// and the Tiled JSON schema is the only format we load.

use crate::domain::errors::MapFormatError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

// Tiled stores flip/rotation flags in the top bits of every gid.
const GID_FLAGS_MASK: u32 = 0xE000_0000;
const COLLIDABLE_PROPERTY_NAMES: [&str; 3] = ["collideable", "collidable", "collides"];
const LAYER_COLLIDES_PROPERTY: &str = "collides";

#[derive(Debug, Deserialize)]
struct TiledMap {
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    layers: Vec<TiledLayer>,
    #[serde(default)]
    tilesets: Vec<TiledTileset>,
}

#[derive(Debug, Deserialize)]
struct TiledLayer {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    data: Option<Vec<u32>>,
    #[serde(default)]
    chunks: Option<Vec<TiledChunk>>,
    #[serde(default)]
    layers: Vec<TiledLayer>,
    #[serde(default)]
    properties: Vec<TiledProperty>,
}

#[derive(Debug, Deserialize)]
struct TiledChunk {
    data: Vec<u32>,
    width: u32,
    height: u32,
    x: i32,
    y: i32,
}

#[derive(Debug, Deserialize)]
struct TiledTileset {
    firstgid: u32,
    #[serde(default)]
    tiles: Vec<TiledTile>,
}

#[derive(Debug, Deserialize)]
struct TiledTile {
    id: u32,
    #[serde(default)]
    properties: Vec<TiledProperty>,
}

#[derive(Debug, Deserialize)]
struct TiledProperty {
    name: String,
    #[serde(default)]
    value: Value,
}

fn flag_set(properties: &[TiledProperty], names: &[&str]) -> bool {
    properties
        .iter()
        .any(|p| names.contains(&p.name.as_str()) && p.value.as_bool() == Some(true))
}

/// A rectangular block of tile ids whose top-left corner sits at (`x`, `y`) in tile space.
#[derive(Debug, Clone)]
struct Grid {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    gids: Vec<u32>,
}

impl Grid {
    fn new(x: i32, y: i32, width: u32, height: u32, gids: Vec<u32>) -> Result<Self, String> {
        let expected = width as usize * height as usize;
        if gids.len() != expected {
            return Err(format!(
                "grid at ({x}, {y}) has {} tiles, expected {width}x{height}",
                gids.len()
            ));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
            gids,
        })
    }

    // Chunk origin is the top-left corner, as Tiled writes it; the older loader's
    // bottom-right reading is intentionally not reproduced.
    fn gid_at(&self, tile_x: i32, tile_y: i32) -> Option<u32> {
        let local_x = i64::from(tile_x) - i64::from(self.x);
        let local_y = i64::from(tile_y) - i64::from(self.y);
        if local_x < 0
            || local_y < 0
            || local_x >= i64::from(self.width)
            || local_y >= i64::from(self.height)
        {
            return None;
        }
        let index = local_y as usize * self.width as usize + local_x as usize;
        self.gids.get(index).map(|gid| gid & !GID_FLAGS_MASK)
    }
}

#[derive(Debug, Clone)]
struct CollisionLayer {
    name: String,
    // Layer-level `collides` flag: any non-empty tile blocks.
    collides: bool,
    grids: Vec<Grid>,
}

/// Immutable collision view over a loaded tile map.
///
/// Queries are pure functions of the tile coordinate, so a shared reference can be read from
/// every entity update within a tick.
#[derive(Debug, Clone)]
pub struct TileCollisionIndex {
    tile_width: u32,
    tile_height: u32,
    layers: Vec<CollisionLayer>,
    collidable_gids: HashSet<u32>,
}

impl TileCollisionIndex {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MapFormatError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| MapFormatError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, MapFormatError> {
        let map: TiledMap = serde_json::from_str(raw)?;
        Self::from_tiled(map)
    }

    fn from_tiled(map: TiledMap) -> Result<Self, MapFormatError> {
        if map.tilewidth == 0 || map.tileheight == 0 {
            return Err(MapFormatError::Invalid("tile size must be non-zero".into()));
        }

        let collidable_gids = map
            .tilesets
            .iter()
            .flat_map(|tileset| {
                tileset
                    .tiles
                    .iter()
                    .filter(|tile| flag_set(&tile.properties, &COLLIDABLE_PROPERTY_NAMES))
                    .map(move |tile| {
                        tileset.firstgid.checked_add(tile.id).ok_or_else(|| {
                            MapFormatError::Invalid(format!(
                                "tile id {} overflows firstgid {}",
                                tile.id, tileset.firstgid
                            ))
                        })
                    })
            })
            .collect::<Result<HashSet<u32>, _>>()?;

        let mut layers = Vec::new();
        collect_tile_layers(map.layers, &mut layers)?;
        if layers.is_empty() {
            return Err(MapFormatError::Invalid("map has no tile layers".into()));
        }

        Ok(Self {
            tile_width: map.tilewidth,
            tile_height: map.tileheight,
            layers,
            collidable_gids,
        })
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    /// Converts a world coordinate into the tile that contains it.
    pub fn tile_of(&self, world_x: f32, world_y: f32) -> (i32, i32) {
        (
            (world_x / self.tile_width as f32).floor() as i32,
            (world_y / self.tile_height as f32).floor() as i32,
        )
    }

    /// Returns true when any collision layer reports the tile as blocking.
    ///
    /// Coordinates not covered by any grid are open.
    pub fn is_blocked(&self, tile_x: i32, tile_y: i32) -> bool {
        self.layers.iter().any(|layer| {
            layer.grids.iter().any(|grid| match grid.gid_at(tile_x, tile_y) {
                Some(0) | None => false,
                Some(gid) => layer.collides || self.collidable_gids.contains(&gid),
            })
        })
    }

    pub fn is_blocked_at(&self, world_x: f32, world_y: f32) -> bool {
        let (tile_x, tile_y) = self.tile_of(world_x, world_y);
        self.is_blocked(tile_x, tile_y)
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.name.as_str())
    }
}

fn collect_tile_layers(
    layers: Vec<TiledLayer>,
    out: &mut Vec<CollisionLayer>,
) -> Result<(), MapFormatError> {
    for layer in layers {
        match layer.kind.as_str() {
            "group" => collect_tile_layers(layer.layers, out)?,
            "tilelayer" => out.push(tile_layer(layer)?),
            // Object and image layers carry no tiles.
            _ => {}
        }
    }
    Ok(())
}

fn tile_layer(layer: TiledLayer) -> Result<CollisionLayer, MapFormatError> {
    let collides = flag_set(&layer.properties, &[LAYER_COLLIDES_PROPERTY]);
    let grids = match (layer.chunks, layer.data) {
        (Some(chunks), _) => chunks
            .into_iter()
            .map(|c| Grid::new(c.x, c.y, c.width, c.height, c.data))
            .collect::<Result<Vec<_>, _>>(),
        (None, Some(data)) => {
            let (Some(width), Some(height)) = (layer.width, layer.height) else {
                return Err(MapFormatError::Invalid(format!(
                    "layer {:?} has data but no width/height",
                    layer.name
                )));
            };
            Grid::new(0, 0, width, height, data).map(|grid| vec![grid])
        }
        (None, None) => Err(format!("layer {:?} has neither data nor chunks", layer.name)),
    }
    .map_err(MapFormatError::Invalid)?;

    Ok(CollisionLayer {
        name: layer.name,
        collides,
        grids,
    })
}
