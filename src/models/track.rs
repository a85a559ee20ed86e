use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct TrackPoint {
    pub x: f32,
    pub y: f32,
    pub curvature: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Asphalt,
    Concrete,
    Mixed,
}

/// Maps the `track.json` fixture file; loaded once at startup.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TrackConfig {
    pub id: String,
    pub name: String,
    pub length_m: f32,
    pub sectors: u32,
    pub corners: u32,
    pub elevation_change_m: f32,
    pub surface: Surface,
    pub difficulty: f32,
}

/// Read-only reference data for one track. The physics kernel (C4) consults
/// `curvature_at` for the average corner radius at a participant's current
/// position; nothing else on this type is mutated after load.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Track {
    pub id: Uuid,
    pub name: String,
    pub length_m: f32,
    pub sectors: u32,
    pub corners: u32,
    pub elevation_change_m: f32,
    pub surface: Surface,
    pub difficulty: f32,
    pub sampled_curvature: Vec<TrackPoint>,
}

impl Track {
    /// Average curvature near `distance_m` along the lap, used to derive
    /// lateral-G for tire wear and cornering speed loss.
    pub fn curvature_at(&self, distance_m: f32) -> f32 {
        if self.sampled_curvature.is_empty() {
            return 0.0;
        }
        let ratio = (distance_m / self.length_m).rem_euclid(1.0);
        let index = (ratio * self.sampled_curvature.len() as f32).round() as usize;
        self.sampled_curvature[index % self.sampled_curvature.len()].curvature
    }

    pub fn load(id: Uuid, dir: &str) -> Result<Track, io::Error> {
        let data = fs::read_to_string(format!("{}/track.json", dir))?;
        let config: TrackConfig = serde_json::from_str(&data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let sampled_curvature = Self::load_curvature(&format!("{}/curvature.bin", dir))?;
        Ok(Track {
            id,
            name: config.name,
            length_m: config.length_m,
            sectors: config.sectors,
            corners: config.corners,
            elevation_change_m: config.elevation_change_m,
            surface: config.surface,
            difficulty: config.difficulty,
            sampled_curvature,
        })
    }

    fn load_curvature(path: &str) -> Result<Vec<TrackPoint>, io::Error> {
        let mut file = fs::File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;

        if buffer.len() < 4 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "file too small"));
        }
        let count = i32::from_le_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
        let expected_size = 4 + (count * 12);
        if buffer.len() < expected_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "file too small for expected point count",
            ));
        }

        let mut points = Vec::with_capacity(count);
        let mut offset = 4;
        for _ in 0..count {
            let x = f32::from_le_bytes(buffer[offset..offset + 4].try_into().unwrap());
            let y = f32::from_le_bytes(buffer[offset + 4..offset + 8].try_into().unwrap());
            let curvature = f32::from_le_bytes(buffer[offset + 8..offset + 12].try_into().unwrap());
            offset += 12;
            points.push(TrackPoint { x, y, curvature });
        }
        Ok(points)
    }
}

/// Fixed in-memory catalog of read-only tracks, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TrackCatalog {
    tracks: HashMap<Uuid, Track>,
}

impl TrackCatalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: tracks.into_iter().map(|t| (t.id, t)).collect(),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Loads the bundled read-only fixture (`fixtures/tracks.json`), a plain
    /// JSON encoding of `sampled_curvature` used in place of the reference
    /// server's separate `track.json`/`curvature.bin` pair so the whole
    /// catalog ships as one text fixture; `Track::load` remains available for
    /// that on-disk binary format when a per-track asset directory exists.
    pub fn load_from_fixture(path: &str) -> io::Result<TrackCatalog> {
        let data = fs::read_to_string(path)?;
        let tracks: Vec<Track> =
            serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(TrackCatalog::new(tracks))
    }
}
