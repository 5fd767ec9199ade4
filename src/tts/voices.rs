//! Voices offered to the user.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Voice {
    pub id: &'static str,
    pub label: &'static str,
}

pub const VOICES: &[Voice] = &[
    Voice {
        id: "zh-CN-XiaoxiaoNeural",
        label: "🌸 晓晓 (治愈女声)",
    },
    Voice {
        id: "zh-CN-YunxiNeural",
        label: "🌲 云希 (温暖男声)",
    },
];

pub fn label_for(id: &str) -> Option<&'static str> {
    VOICES.iter().find(|v| v.id == id).map(|v| v.label)
}
