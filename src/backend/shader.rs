// Shader module loading
//
// The pipeline's two stages come from precompiled SPIR-V files read at
// startup. `read_spv` takes care of word alignment.

use ash::vk;
use std::io::Cursor;
use std::path::Path;

use super::LogicalDevice;
use crate::error::{SetupContext, SetupError};

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Read a SPIR-V binary from disk into 32-bit words.
pub fn load_spirv(path: &Path) -> Result<Vec<u32>, SetupError> {
    let bytes = std::fs::read(path).map_err(|source| SetupError::ShaderRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_spirv(path, &bytes)
}

pub fn parse_spirv(path: &Path, bytes: &[u8]) -> Result<Vec<u32>, SetupError> {
    let is_spirv = bytes.get(..4).map_or(false, |head| {
        let head = [head[0], head[1], head[2], head[3]];
        u32::from_le_bytes(head) == SPIRV_MAGIC || u32::from_be_bytes(head) == SPIRV_MAGIC
    });
    if !is_spirv {
        return Err(SetupError::InvalidSpirv {
            path: path.to_path_buf(),
        });
    }

    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|source| SetupError::ShaderRead {
        path: path.to_path_buf(),
        source,
    })
}

pub fn create_shader_module(
    device: &LogicalDevice,
    code: &[u32],
) -> Result<vk::ShaderModule, SetupError> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

    unsafe { device.device.create_shader_module(&create_info, None) }
        .setup_context("vkCreateShaderModule")
}

/// Load a SPIR-V file and wrap it in a shader module
pub fn load_shader_module(
    device: &LogicalDevice,
    path: &Path,
) -> Result<vk::ShaderModule, SetupError> {
    let code = load_spirv(path)?;
    log::debug!("Loaded shader {:?} ({} words)", path, code.len());
    create_shader_module(device, &code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn accepts_spirv_header() {
        let bytes = words_to_bytes(&[SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]);
        let words = parse_spirv(Path::new("ok.spv"), &bytes).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], SPIRV_MAGIC);
    }

    #[test]
    fn rejects_truncated_module() {
        let mut bytes = words_to_bytes(&[SPIRV_MAGIC, 0]);
        bytes.pop();
        assert!(matches!(
            parse_spirv(Path::new("short.spv"), &bytes),
            Err(SetupError::ShaderRead { .. })
        ));
    }

    #[test]
    fn rejects_non_spirv_data() {
        let bytes = b"#version 450\n\0\0\0".to_vec();
        assert!(matches!(
            parse_spirv(Path::new("triangle.vert"), &bytes),
            Err(SetupError::InvalidSpirv { .. })
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let path = std::env::temp_dir().join("swapchain-renderer-no-such-shader.spv");
        match load_spirv(&path) {
            Err(SetupError::ShaderRead { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
