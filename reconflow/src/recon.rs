//! The reconnaissance catalog: tools, their installers and the stage list.
//!
//! Stages are declared in the order an operator would run them by hand.
//! Their input and output files drive the dependency graph:
//!
//! ```text
//! subdomains ─┬─ alive ─┬─ urls ─┬─ sensitive_files, js_analysis, xss, lfi, redirect
//!             │         └─ dirsearch, cors, nuclei
//!             └─ takeover
//! ```

use std::sync::Arc;

use crate::config::ScannerConfig;
use crate::errors::PipelineValidationError;
use crate::pipeline::{PipelineBuilder, StageGraph};
use crate::stages::ToolStage;
use crate::tools::{ToolRegistry, ToolSpec};

/// Name of the recon pipeline.
pub const PIPELINE_NAME: &str = "recon";

/// Subdomains found by subfinder.
pub const SUBS_FILE: &str = "subs.txt";
/// Live hosts found by httpx.
pub const ALIVE_FILE: &str = "alive.txt";
/// URLs crawled by katana.
pub const URLS_FILE: &str = "urls.txt";

/// The built-in tool table.
#[must_use]
pub fn recon_tools() -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(ToolSpec::new(
            "subfinder",
            "go install -v github.com/projectdiscovery/subfinder/v2/cmd/subfinder@latest",
        ))
        .with_tool(ToolSpec::new(
            "httpx",
            "go install -v github.com/projectdiscovery/httpx/cmd/httpx@latest",
        ))
        .with_tool(ToolSpec::new(
            "katana",
            "go install -v github.com/projectdiscovery/katana/cmd/katana@latest",
        ))
        .with_tool(ToolSpec::new(
            "nuclei",
            "go install -v github.com/projectdiscovery/nuclei/v2/cmd/nuclei@latest",
        ))
        .with_tool(ToolSpec::new("gf", "go install -v github.com/tomnomnom/gf@latest").with_setup("gf -install"))
        .with_tool(ToolSpec::new("dirsearch", "pip3 install dirsearch"))
        .with_tool(ToolSpec::new("bxss", "go install -v github.com/PortSwigger/bxss@latest"))
        .with_tool(ToolSpec::new("subzy", "go install -v github.com/LukaSikic/subzy@latest"))
        .with_tool(ToolSpec::new("corsy", "pip3 install corsy"))
        .with_tool(ToolSpec::new(
            "openredirex",
            "(test -d {tools_dir}/OpenRedireX || git clone --depth 1 https://github.com/DevShaft/OpenRedireX {tools_dir}/OpenRedireX) \
             && chmod +x {tools_dir}/OpenRedireX/openredirex.py \
             && ln -sf {tools_dir}/OpenRedireX/openredirex.py {tools_dir}/bin/openredirex",
        ))
}

/// The tool table with the config's per-tool overrides applied.
#[must_use]
pub fn recon_registry(config: &ScannerConfig) -> ToolRegistry {
    recon_tools().with_overrides(&config.tools)
}

/// Builds the twelve-stage recon pipeline.
///
/// # Errors
///
/// Returns an error only if the stage table is inconsistent.
pub fn recon_pipeline(config: &ScannerConfig) -> Result<StageGraph, PipelineValidationError> {
    let registry = recon_registry(config);
    let tool = |stage: &str, name: &str| {
        let program = registry.get(name).map_or(name, |spec| spec.binary.as_str());
        ToolStage::new(stage, name).with_program(program)
    };
    let payloads = config
        .tools_dir
        .join("OpenRedireX")
        .join("payloads.txt")
        .display()
        .to_string();

    let stages = vec![
        tool("subdomains", "subfinder")
            .arg("-d")
            .target()
            .args(["-all", "-recursive", "-o"])
            .output(SUBS_FILE),
        tool("alive", "httpx")
            .arg("-l")
            .input(SUBS_FILE)
            .args(["-ports", "80,443,8000,8008,8888", "-threads", "200", "-o"])
            .output(ALIVE_FILE),
        tool("urls", "katana")
            .arg("-list")
            .input(ALIVE_FILE)
            .args(["-d", "3", "-jc", "-silent", "-o"])
            .output(URLS_FILE),
        tool("sensitive_files", "nuclei")
            .arg("-l")
            .input(URLS_FILE)
            .args(["-tags", "exposure,config,backup", "-o"])
            .output("sensitive.txt"),
        tool("js_analysis", "nuclei")
            .arg("-l")
            .input(URLS_FILE)
            .args(["-tags", "javascript,token", "-o"])
            .output("js.txt"),
        tool("dirsearch", "dirsearch")
            .arg("-l")
            .input(ALIVE_FILE)
            .args(["-t", "50", "--format", "plain", "-o"])
            .output("dirsearch.txt"),
        tool("xss", "bxss")
            .arg("-payload")
            .arg(config.xss_payload.clone())
            .arg("-parameters")
            .stdin_from(URLS_FILE)
            .stdout_to("xss.txt"),
        tool("takeover", "subzy")
            .args(["run", "--targets"])
            .input(SUBS_FILE)
            .args(["--hide_fails", "--output"])
            .output("takeover.json"),
        tool("cors", "corsy")
            .arg("-i")
            .input(ALIVE_FILE)
            .args(["-t", "20", "-o"])
            .output("cors.json"),
        tool("nuclei", "nuclei")
            .arg("-l")
            .input(ALIVE_FILE)
            .args(["-severity", "low,medium,high,critical", "-o"])
            .output("nuclei.txt"),
        tool("lfi", "gf")
            .arg("lfi")
            .stdin_from(URLS_FILE)
            .stdout_to("lfi.txt"),
        tool("redirect", "openredirex")
            .arg("-l")
            .input(URLS_FILE)
            .args(["-p", payloads.as_str(), "--keyword", "FUZZ"])
            .stdout_to("redirects.txt"),
    ];

    let mut builder = PipelineBuilder::new(PIPELINE_NAME);
    for stage in stages {
        builder = builder.stage(Arc::new(stage), &[])?;
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolOverride;
    use crate::stages::{Arg, Stage};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn config() -> ScannerConfig {
        ScannerConfig::from_home(Path::new("/home/op"))
    }

    fn names(wave: &[String]) -> Vec<&str> {
        wave.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_recon_tools() {
        let tools = recon_tools();
        assert_eq!(tools.len(), 10);
        assert_eq!(tools.get("gf").unwrap().setup.as_deref(), Some("gf -install"));
        assert!(tools
            .get("openredirex")
            .unwrap()
            .install_command(Path::new("/cache"))
            .contains("ln -sf '/cache'/OpenRedireX/openredirex.py '/cache'/bin/openredirex"));
    }

    #[test]
    fn test_declared_order() {
        let graph = recon_pipeline(&config()).unwrap();
        assert_eq!(
            graph.stage_names(),
            vec![
                "subdomains",
                "alive",
                "urls",
                "sensitive_files",
                "js_analysis",
                "dirsearch",
                "xss",
                "takeover",
                "cors",
                "nuclei",
                "lfi",
                "redirect",
            ]
        );
    }

    #[test]
    fn test_wave_shape() {
        let graph = recon_pipeline(&config()).unwrap();
        let waves = graph.waves();

        assert_eq!(waves.len(), 4);
        assert_eq!(names(&waves[0]), vec!["subdomains"]);
        assert_eq!(names(&waves[1]), vec!["alive", "takeover"]);
        assert_eq!(names(&waves[2]), vec!["urls", "dirsearch", "cors", "nuclei"]);
        assert_eq!(
            names(&waves[3]),
            vec!["sensitive_files", "js_analysis", "xss", "lfi", "redirect"]
        );
    }

    #[test]
    fn test_file_contracts() {
        let graph = recon_pipeline(&config()).unwrap();
        let xss = graph.spec("xss").unwrap();

        assert_eq!(xss.reads, vec!["urls.txt"]);
        assert_eq!(xss.writes, vec!["xss.txt"]);
        assert_eq!(xss.runner.tool(), "bxss");
        assert_eq!(
            graph.spec("takeover").unwrap().dependencies.iter().collect::<Vec<_>>(),
            vec!["subdomains"]
        );
    }

    #[test]
    fn test_binary_override_changes_program() {
        let mut config = config();
        config.tools.insert(
            "httpx".to_string(),
            ToolOverride {
                binary: Some("httpx-toolkit".to_string()),
                ..ToolOverride::default()
            },
        );
        config.xss_payload = "<svg>".to_string();

        let graph = recon_pipeline(&config).unwrap();
        let alive = format!("{:?}", graph.spec("alive").unwrap().runner);
        assert!(alive.contains("httpx-toolkit"));
        assert_eq!(graph.spec("alive").unwrap().runner.tool(), "httpx");

        let xss = format!("{:?}", graph.spec("xss").unwrap().runner);
        assert!(xss.contains(&format!("{:?}", Arg::Literal("<svg>".to_string()))));
    }
}
