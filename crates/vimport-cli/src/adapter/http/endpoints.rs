//! Ingestion service URL builders

/// Camera discovery endpoint
pub fn cameras_discovered_url(server: &str) -> String {
    format!("{}/api/cameras/discovered", server.trim_end_matches('/'))
}

/// Job creation endpoint
pub fn jobs_url(server: &str) -> String {
    format!("{}/api/jobs", server.trim_end_matches('/'))
}

/// Fill the `{filename}` placeholder of the upload URL template
pub fn upload_url(template: &str, given_name: &str) -> String {
    template.replace("{filename}", given_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        assert_eq!(
            cameras_discovered_url("http://svc:8080/"),
            "http://svc:8080/api/cameras/discovered"
        );
        assert_eq!(jobs_url("http://svc:8080"), "http://svc:8080/api/jobs");
        assert_eq!(
            upload_url("http://127.0.0.1:8888/upload/{filename}", "cam.ts.k.mp4"),
            "http://127.0.0.1:8888/upload/cam.ts.k.mp4"
        );
    }
}
