//! Automation-hiding for the search browser.
//!
//! Visual-search pages throttle or blank out sessions that look scripted, so
//! every session launches with a fingerprint-consistent command line and
//! re-applies a set of [`Evasion`]s after each navigation.

use super::fingerprint::UserAgentProfile;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How hard the session works to look like a person's browser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StealthProfile {
    Lightweight,
    #[default]
    Balanced,
    Maximum,
}

impl StealthProfile {
    /// Chrome flags matching `fingerprint`.
    pub fn launch_arguments(&self, fingerprint: &UserAgentProfile) -> Vec<String> {
        let (width, height) = fingerprint.viewport;
        let mut args = vec![
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-infobars".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-first-run".to_string(),
            format!("--user-agent={}", fingerprint.user_agent),
            format!("--window-size={width},{height}"),
            format!("--lang={}", fingerprint.languages.join(",")),
        ];
        if *self != StealthProfile::Lightweight {
            args.push("--disable-extensions".to_string());
        }
        if *self == StealthProfile::Maximum {
            args.push("--disable-gpu".to_string());
        }
        args
    }

    /// Evasions to run after each page load, in order.
    pub fn evasions(&self) -> &'static [Evasion] {
        match self {
            StealthProfile::Lightweight => &[Evasion::Automation],
            StealthProfile::Balanced => &[Evasion::Automation, Evasion::Languages, Evasion::Canvas],
            StealthProfile::Maximum => &[
                Evasion::Automation,
                Evasion::Languages,
                Evasion::Canvas,
                Evasion::WebGl,
                Evasion::Platform,
            ],
        }
    }
}

/// One in-page patch. Scripts read their inputs from `arguments[0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evasion {
    /// Hide `navigator.webdriver` and fake a plugin list and `window.chrome`.
    Automation,
    /// Make `navigator.languages` agree with `--lang`.
    Languages,
    /// Add sparse noise to 2D canvas read-back.
    Canvas,
    /// Report a common GPU vendor and renderer.
    WebGl,
    /// Make `navigator.platform` agree with the user agent.
    Platform,
}

impl Evasion {
    pub fn script(&self) -> &'static str {
        match self {
            Evasion::Automation => {
                r#"
                Object.defineProperty(Navigator.prototype, 'webdriver', { get: () => false });
                if (navigator.plugins.length === 0) {
                    Object.defineProperty(navigator, 'plugins', { get: () => [{ name: 'PDF Viewer' }, { name: 'Chrome PDF Viewer' }] });
                }
                window.chrome = window.chrome || { runtime: {}, app: { isInstalled: false } };
                "#
            }
            Evasion::Languages => {
                "Object.defineProperty(navigator, 'languages', { get: () => arguments[0] });"
            }
            Evasion::Canvas => {
                r#"
                const readPixels = CanvasRenderingContext2D.prototype.getImageData;
                CanvasRenderingContext2D.prototype.getImageData = function (...rect) {
                    const data = readPixels.apply(this, rect);
                    for (let i = 0; i < data.data.length; i += 4 * 97) {
                        data.data[i] ^= 1;
                    }
                    return data;
                };
                "#
            }
            Evasion::WebGl => {
                r#"
                for (const ctx of [WebGLRenderingContext, window.WebGL2RenderingContext].filter(Boolean)) {
                    const query = ctx.prototype.getParameter;
                    ctx.prototype.getParameter = function (p) {
                        if (p === 0x9245) return 'Google Inc. (Intel)';
                        if (p === 0x9246) return 'ANGLE (Intel, Intel(R) UHD Graphics 630, OpenGL 4.1)';
                        return query.call(this, p);
                    };
                }
                "#
            }
            Evasion::Platform => {
                "Object.defineProperty(navigator, 'platform', { get: () => arguments[0] });"
            }
        }
    }

    /// Script arguments taken from the session fingerprint.
    pub fn arguments(&self, fingerprint: &UserAgentProfile) -> Vec<Value> {
        match self {
            Evasion::Languages => vec![Value::from(fingerprint.languages.clone())],
            Evasion::Platform => vec![Value::String(fingerprint.platform.clone())],
            _ => Vec::new(),
        }
    }
}
