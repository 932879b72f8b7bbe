//! What the guard needs to know about an inbound request.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{
        header::{COOKIE, USER_AGENT},
        request::Parts,
        HeaderMap,
    },
};
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use super::fingerprint::Fingerprint;

#[derive(Clone, Debug)]
pub struct ClientRequest {
    headers: HeaderMap,
    peer: IpAddr,
}

impl ClientRequest {
    #[must_use]
    pub fn new(headers: HeaderMap, peer: IpAddr) -> Self {
        Self { headers, peer }
    }

    #[must_use]
    pub fn peer(&self) -> IpAddr {
        self.peer
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
    }

    /// Value of the named cookie, first occurrence across all `Cookie` headers.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .find_map(|pair| {
                let (key, val) = pair.trim().split_once('=')?;
                (key.trim() == name).then(|| val.trim())
            })
            .filter(|val| !val.is_empty())
    }

    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.user_agent(), self.peer)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |info| {
                info.0.ip().to_canonical()
            });
        Ok(Self::new(parts.headers.clone(), peer))
    }
}
