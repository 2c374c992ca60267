//! Rendering of the OBS `_service` file for a branched package.

use quick_xml::escape::escape;

/// Source location the branched package should build from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub branch: &'a str,
}

impl SourceLocation<'_> {
    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.repo)
    }
}

/// Render a `_service` document that checks out `source` with `obs_scm`
/// and packs it into the tarball the RPM build expects.
pub fn render(source: &SourceLocation<'_>) -> String {
    let clone_url = source.clone_url();
    let url = escape(&clone_url);
    let branch = escape(source.branch);
    format!(
        r#"<services>
  <service name="obs_scm" mode="disabled">
    <param name="url">{url}</param>
    <param name="scm">git</param>
    <param name="revision">{branch}</param>
    <param name="versionformat">@PARENT_TAG@</param>
    <param name="versionrewrite-pattern">v(.*)</param>
    <param name="filename">package</param>
  </service>
  <service name="set_version" mode="disabled"/>
  <service name="tar" mode="buildtime"/>
  <service name="recompress" mode="buildtime">
    <param name="file">*.tar</param>
    <param name="compression">gz</param>
  </service>
</services>
"#
    )
}
