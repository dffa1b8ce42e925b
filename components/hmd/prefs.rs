/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use euclid::Size2D;
use hmd_api::{Error, Pixel, RuntimeVersion};
use serde::{Deserialize, Serialize};

/// Runtimes older than this cannot report whether a headset is plugged in.
pub const HMD_CONNECTED_PROPERTY_VERSION: RuntimeVersion = RuntimeVersion::new(1, 4, 0, 0);

/// Tunables of the bridge. Every field falls back to its default when
/// missing from a preference file.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct HmdPrefs {
    pub render_target_width: u32,
    pub render_target_height: u32,
    /// Distance of the near clip plane in world units.
    pub near_clip_plane: f32,
    pub world_to_meters: f64,
    /// Hand a depth swap chain to the compositor along with colour.
    pub submit_depth: bool,
    pub use_occlusion_mesh: bool,
    /// Inter-pupillary distances in metres.
    pub default_ipd: f64,
    pub min_ipd: f64,
    pub max_ipd: f64,
    pub async_submit: bool,
    pub minimum_runtime_version: RuntimeVersion,
}

impl Default for HmdPrefs {
    fn default() -> Self {
        HmdPrefs {
            render_target_width: 4096,
            render_target_height: 3200,
            near_clip_plane: 10.0,
            world_to_meters: 100.0,
            submit_depth: false,
            use_occlusion_mesh: true,
            default_ipd: 0.064,
            min_ipd: 0.050,
            max_ipd: 0.085,
            async_submit: true,
            minimum_runtime_version: HMD_CONNECTED_PROPERTY_VERSION,
        }
    }
}

impl HmdPrefs {
    pub fn from_json(json: &str) -> Result<HmdPrefs, Error> {
        let prefs: HmdPrefs =
            serde_json::from_str(json).map_err(|error| Error::InvalidPrefs(error.to_string()))?;
        prefs.validate()?;
        Ok(prefs)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.render_target_width == 0 || self.render_target_height == 0 {
            return Err(Error::InvalidPrefs("empty render target".into()));
        }
        if !(self.world_to_meters > 0.) {
            return Err(Error::InvalidPrefs(format!(
                "world_to_meters must be positive, got {}",
                self.world_to_meters
            )));
        }
        if !(self.near_clip_plane > 0.) {
            return Err(Error::InvalidPrefs(format!(
                "near_clip_plane must be positive, got {}",
                self.near_clip_plane
            )));
        }
        if self.min_ipd >= self.max_ipd {
            return Err(Error::InvalidPrefs(format!(
                "IPD range {}..{} is empty",
                self.min_ipd, self.max_ipd
            )));
        }
        Ok(())
    }

    pub fn render_target_size(&self) -> Size2D<u32, Pixel> {
        Size2D::new(self.render_target_width, self.render_target_height)
    }

    /// Accepts a measured IPD only when it lies strictly inside the
    /// configured range.
    pub fn clamp_ipd(&self, measured: Option<f64>) -> f64 {
        match measured {
            Some(ipd) if ipd > self.min_ipd && ipd < self.max_ipd => ipd,
            _ => self.default_ipd,
        }
    }
}

#[cfg(test)]
mod test {
    use hmd_api::{Error, RuntimeVersion};

    use super::HmdPrefs;

    #[test]
    fn test_missing_fields_use_defaults() {
        let prefs = HmdPrefs::from_json(r#"{ "submit_depth": true }"#).unwrap();
        assert!(prefs.submit_depth);
        assert_eq!(prefs.render_target_width, 4096);
        assert_eq!(prefs.near_clip_plane, 10.0);
        assert_eq!(prefs.minimum_runtime_version, RuntimeVersion::new(1, 4, 0, 0));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(matches!(
            HmdPrefs::from_json("{ submit_depth: yes"),
            Err(Error::InvalidPrefs(_))
        ));
    }

    #[test]
    fn test_inverted_ipd_range_is_rejected() {
        assert!(matches!(
            HmdPrefs::from_json(r#"{ "min_ipd": 0.09, "max_ipd": 0.05 }"#),
            Err(Error::InvalidPrefs(_))
        ));
    }

    #[test]
    fn test_ipd_outside_range_falls_back() {
        let prefs = HmdPrefs::default();
        assert_eq!(prefs.clamp_ipd(Some(0.070)), 0.070);
        assert_eq!(prefs.clamp_ipd(Some(0.050)), 0.064);
        assert_eq!(prefs.clamp_ipd(Some(0.1)), 0.064);
        assert_eq!(prefs.clamp_ipd(None), 0.064);
    }
}
