//! Site block synthesis
//!
//! Pure text templates, no I/O. The three shapes exist because proxy target
//! services differ in what the proxy engine needs from them: some route fine
//! off the host alone, some need the forward-everything path made explicit,
//! and WebSocket services need a dedicated upgrade matcher so the default
//! buffering behavior does not break the handshake.

use crate::catalog::ServiceKind;

/// Render the site block for one service
pub fn synthesize(kind: ServiceKind, host: &str, target: &str) -> String {
    match kind {
        ServiceKind::Plain => format!(
            "{host} {{\n    reverse_proxy {target}\n}}",
            host = host,
            target = target
        ),
        ServiceKind::PathScoped => format!(
            "{host} {{\n    reverse_proxy /* {target}\n}}",
            host = host,
            target = target
        ),
        ServiceKind::WebsocketUpgrading => format!(
            "{host} {{\n    reverse_proxy /* {target}\n    @websockets {{\n        header Connection *Upgrade*\n        header Upgrade websocket\n    }}\n    reverse_proxy @websockets {target}\n}}",
            host = host,
            target = target
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_block_has_exactly_one_directive() {
        let block = synthesize(ServiceKind::Plain, "app.t1.example.com", "10.0.0.5:3000");
        assert_eq!(block.matches("reverse_proxy").count(), 1);
        assert!(block.starts_with("app.t1.example.com {\n"));
        assert!(block.contains("reverse_proxy 10.0.0.5:3000"));
        assert!(block.ends_with("}"));
    }

    #[test]
    fn test_path_scoped_block() {
        let block = synthesize(ServiceKind::PathScoped, "code.t1.example.com", "10.0.0.5:8443");
        assert_eq!(block.matches("reverse_proxy").count(), 1);
        assert!(block.contains("reverse_proxy /* 10.0.0.5:8443"));
    }

    #[test]
    fn test_websocket_block_has_both_directives() {
        let block = synthesize(
            ServiceKind::WebsocketUpgrading,
            "term.t1.example.com",
            "10.0.0.5:7681",
        );
        // unconditional path-scoped proxy plus upgrade-matcher proxy, both
        // routing to the same target
        assert!(block.contains("reverse_proxy /* 10.0.0.5:7681"));
        assert!(block.contains("reverse_proxy @websockets 10.0.0.5:7681"));
        assert!(block.contains("header Connection *Upgrade*"));
        assert!(block.contains("header Upgrade websocket"));
        assert_eq!(block.matches("reverse_proxy").count(), 2);
    }

    #[test]
    fn test_blocks_parse_back() {
        use crate::caddyfile::ConfigDocument;

        for kind in [
            ServiceKind::Plain,
            ServiceKind::PathScoped,
            ServiceKind::WebsocketUpgrading,
        ] {
            let block = synthesize(kind, "svc.t1.example.com", "10.0.0.5:9000");
            let doc = ConfigDocument::parse(&block);
            assert_eq!(doc.sites.len(), 1, "kind {:?}", kind);
            assert_eq!(doc.sites[0].host, "svc.t1.example.com");
            assert_eq!(doc.sites[0].proxy_target(), Some("10.0.0.5:9000"));
        }
    }
}
