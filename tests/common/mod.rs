use scrivener_xslt::test_helpers::stylesheet;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// `main` schedules `tick`, and every `tick` prints its counter and
/// schedules the next one.
pub fn ticker() -> String {
    stylesheet(
        r#"<xsl:template name="main"><xsl:text>started</xsl:text><ixsl:schedule-action wait="5"><xsl:call-template name="tick"><xsl:with-param name="n" select="1"/></xsl:call-template></ixsl:schedule-action></xsl:template><xsl:template name="tick"><xsl:param name="n" as="xs:integer" required="yes"/><xsl:value-of select="$n"/><ixsl:schedule-action wait="1"><xsl:call-template name="tick"><xsl:with-param name="n" select="$n + 1"/></xsl:call-template></ixsl:schedule-action></xsl:template>"#,
    )
}

/// Writes `contents` to `name` inside a fresh temporary directory.
/// Keep the directory alive for as long as the file is needed.
pub fn write_temp(name: &str, contents: &str) -> Result<(TempDir, PathBuf), std::io::Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(name);
    fs::write(&path, contents)?;
    Ok((dir, path))
}
