//! Looping decorative animations on scene nodes.

use crate::map::Pillar;
use crate::scene::{NodeId, NodeKind, Scene, Shading};
use glam::{DQuat, DVec2, DVec3};
use std::f64::consts::TAU;

#[derive(Debug, Clone, PartialEq)]
pub enum Motion {
    /// Grow from `from` to `to` scale while fading out
    Pulse { from: f64, to: f64, base_opacity: f64 },
    /// Scroll the texture offset by `speed` per period
    Scroll { speed: DVec2 },
    /// Bounce along z around `base_z`
    Bob { amplitude: f64, base_z: f64 },
    /// Full turn about z per period
    Spin { base: DQuat },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub node: NodeId,
    /// Seconds per loop
    pub period: f64,
    pub motion: Motion,
}

impl Track {
    /// Scale pulse that reads the current opacity as its start value
    pub fn pulse(scene: &Scene, node: NodeId, period: f64, from: f64, to: f64) -> Self {
        let base_opacity = match scene.get(node).map(|n| &n.kind) {
            Some(NodeKind::Mesh(mesh)) => mesh.materials.first().map_or(1.0, |m| m.opacity),
            Some(NodeKind::Sprite(sprite)) => sprite.material.opacity,
            _ => 1.0,
        };
        Self {
            node,
            period,
            motion: Motion::Pulse { from, to, base_opacity },
        }
    }

    pub fn scroll(node: NodeId, period: f64, speed: DVec2) -> Self {
        Self {
            node,
            period,
            motion: Motion::Scroll { speed },
        }
    }

    pub fn bob(scene: &Scene, node: NodeId, period: f64, amplitude: f64) -> Self {
        let base_z = scene.get(node).map_or(0.0, |n| n.transform.translation.z);
        Self {
            node,
            period,
            motion: Motion::Bob { amplitude, base_z },
        }
    }

    pub fn spin(scene: &Scene, node: NodeId, period: f64) -> Self {
        let base = scene.get(node).map_or(DQuat::IDENTITY, |n| n.transform.rotation);
        Self {
            node,
            period,
            motion: Motion::Spin { base },
        }
    }

    fn apply(&self, scene: &mut Scene, elapsed: f64) {
        let period = self.period.max(f64::EPSILON);
        let phase = (elapsed / period).fract();
        let Some(node) = scene.get_mut(self.node) else {
            return;
        };

        match &self.motion {
            Motion::Pulse { from, to, base_opacity } => {
                let s = from + (to - from) * phase;
                node.transform.scale = DVec3::new(s, s, 1.0);
                let opacity = base_opacity * (1.0 - phase);
                if let NodeKind::Mesh(mesh) = &mut node.kind {
                    for m in &mut mesh.materials {
                        m.opacity = opacity;
                    }
                }
            }
            Motion::Scroll { speed } => {
                if let NodeKind::Mesh(mesh) = &mut node.kind {
                    for m in &mut mesh.materials {
                        if let Shading::Textured { offset, .. } = &mut m.shading {
                            let o = *speed * (elapsed / period);
                            *offset = DVec2::new(o.x.rem_euclid(1.0), o.y.rem_euclid(1.0));
                        }
                    }
                }
            }
            Motion::Bob { amplitude, base_z } => {
                node.transform.translation.z = base_z + amplitude * (phase * TAU).sin();
            }
            Motion::Spin { base } => {
                node.transform.rotation = *base * DQuat::from_rotation_z(phase * TAU);
            }
        }
    }
}

pub struct Animator {
    tracks: Vec<Track>,
    elapsed: f64,
    pub playing: bool,
}

impl Animator {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            elapsed: 0.0,
            playing: true,
        }
    }

    /// Standard loops for light pillars: pulsing rings, scrolling halos,
    /// bobbing markers
    pub fn for_pillars(scene: &Scene, pillars: &[Pillar]) -> Self {
        let mut animator = Self::new();
        for pillar in pillars {
            animator.push(Track::pulse(scene, pillar.ring, 2.0, 1.0, 2.5));
            for &halo in &pillar.halos {
                animator.push(Track::scroll(halo, 3.0, DVec2::new(0.0, 1.0)));
            }
            animator.push(Track::bob(scene, pillar.marker, 1.5, 0.8));
            animator.push(Track::spin(scene, pillar.bar, 6.0));
        }
        animator
    }

    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn toggle(&mut self) {
        self.playing = !self.playing;
    }

    /// Advance by `dt` seconds. Tracks whose node is gone are dropped.
    pub fn tick(&mut self, scene: &mut Scene, dt: f64) {
        self.tracks.retain(|t| scene.contains(t.node));
        if !self.playing || dt <= 0.0 {
            return;
        }
        self.elapsed += dt;
        for track in &self.tracks {
            track.apply(scene, self.elapsed);
        }
    }
}

impl Default for Animator {
    fn default() -> Self {
        Self::new()
    }
}
