//! `combine_script.sh`: one workspace-conversion call per kinematic bin.

use std::path::Path;

use tnp_core::Result;

/// File name of the generated script.
pub const SCRIPT_NAME: &str = "combine_script.sh";

const PHYSICS_MODEL: &str = "HiggsAnalysis.CombinedLimit.TagAndProbeExtended:tagAndProbe";

/// Script text converting every `<bin>.txt` card into `workspace_<bin>.root`.
pub fn render_workspace_script<S: AsRef<str>>(bins: &[S], categories: &[S]) -> String {
    let categories: Vec<&str> = categories.iter().map(AsRef::as_ref).collect();
    let mut script = String::from("#!/bin/bash\n# Converting datacards to workspace file for portability\n");
    for bin in bins {
        let bin = bin.as_ref();
        script.push_str(&format!(
            "text2workspace.py -m 125 -P {PHYSICS_MODEL} {bin}.txt -o workspace_{bin}.root --PO=categories={}\n",
            categories.join(",")
        ));
    }
    script
}

/// Write the script to `dir/combine_script.sh`.
pub fn write_workspace_script<S: AsRef<str>>(dir: &Path, bins: &[S], categories: &[S]) -> Result<()> {
    let path = dir.join(SCRIPT_NAME);
    std::fs::write(&path, render_workspace_script(bins, categories))?;
    tracing::info!(path = %path.display(), bins = bins.len(), "wrote workspace script");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_line_per_bin_with_ordered_categories() {
        let script = render_workspace_script(&["0to100", "high"], &["sig", "bkg"]);
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "#!/bin/bash");
        assert_eq!(
            lines[2],
            "text2workspace.py -m 125 -P HiggsAnalysis.CombinedLimit.TagAndProbeExtended:tagAndProbe \
             0to100.txt -o workspace_0to100.root --PO=categories=sig,bkg"
        );
        assert!(lines[3].contains("high.txt -o workspace_high.root"));
    }
}
