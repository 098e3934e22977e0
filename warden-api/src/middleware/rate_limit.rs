/// Rate limiting middleware for public link resolution
///
/// `GET /s/:token` needs no credential, so it is limited per client address with a
/// token bucket kept in Redis. The limit only applies when `REDIS_URL` is set.
///
/// # Algorithm
///
/// Uses token bucket algorithm:
/// - Tokens refill at constant rate (`LINK_RATE_LIMIT_PER_MINUTE / 60` per second)
/// - Each request consumes 1 token
/// - Request blocked if bucket empty
///
/// The bucket update runs as one Lua script, so concurrent requests from the same
/// client cannot both take the last token.
///
/// # Storage
///
/// State stored in Redis with keys: `ratelimit:link:{client}`
/// TTL: 2 minutes (auto-cleanup)
///
/// # Client address
///
/// The peer address identifies the client unless `TRUSTED_PROXY_HOPS` says how many
/// proxies sit in front of the server. Each proxy appends the address it saw to
/// `X-Forwarded-For`, so only the entries counted from the right are ours; anything
/// further left was sent by the client and is ignored.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: Requests allowed per minute
/// - `X-RateLimit-Remaining`: Tokens remaining
/// - `Retry-After`: Seconds to wait (429 responses only)
///
/// # Failure mode
///
/// Redis errors fail open: the request proceeds and a warning is logged.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::net::{IpAddr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token bucket parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Maximum requests per minute
    pub requests_per_minute: u32,

    /// Token refill rate (tokens per second)
    pub refill_rate: f64,

    /// Maximum tokens in bucket (burst capacity)
    pub bucket_capacity: u32,
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        RateLimit {
            requests_per_minute,
            refill_rate: f64::from(requests_per_minute) / 60.0,
            bucket_capacity: requests_per_minute,
        }
    }
}

/// Result of rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether request is allowed
    pub ok: bool,

    /// Tokens remaining
    pub remaining: u32,

    /// Seconds until a token is available again
    pub retry_after: u64,
}

const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + (elapsed * refill_rate))

if tokens >= 1 then
    tokens = tokens - 1
    redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, 120)
    return {1, math.floor(tokens), 0}
else
    redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, 120)
    return {0, 0, math.ceil((1 - tokens) / refill_rate)}
end
"#;

/// Rate limiting middleware for `GET /s/:token`
///
/// # Errors
///
/// - 429 Too Many Requests: Rate limit exceeded
pub async fn link_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(redis) = state.redis.clone() else {
        return Ok(next.run(request).await);
    };

    let rate_limit = RateLimit::per_minute(state.config.rate_limit.link_requests_per_minute);
    let client = client_address(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        state.config.rate_limit.trusted_proxy_hops,
    );

    let result = match check_rate_limit(redis, &client, rate_limit).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "Rate limit check failed, allowing request");
            return Ok(next.run(request).await);
        }
    };

    if !result.ok {
        tracing::debug!(client = %client, retry_after = result.retry_after, "Link resolution rate limited");
        return Err(ApiError::RateLimitExceeded {
            retry_after: result.retry_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                result.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(rate_limit.requests_per_minute));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));

    Ok(response)
}

/// Identifies the caller
///
/// With `trusted_hops` proxies in front, the client is the `trusted_hops`-th
/// `X-Forwarded-For` entry from the right. Zero hops, a short header, or an entry that
/// is not an IP address fall back to the peer address.
pub fn client_address(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>, trusted_hops: usize) -> String {
    let forwarded = (trusted_hops > 0)
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(',').nth(trusted_hops - 1))
        .and_then(|hop| hop.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Takes one token from the client's bucket
///
/// # Errors
///
/// Returns error if the Redis script fails
pub async fn check_rate_limit(
    mut conn: ConnectionManager,
    client: &str,
    rate_limit: RateLimit,
) -> Result<RateLimitResult, redis::RedisError> {
    let key = format!("ratelimit:link:{}", client);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let result: (i64, i64, i64) = redis::Script::new(TOKEN_BUCKET_SCRIPT)
        .key(&key)
        .arg(rate_limit.bucket_capacity)
        .arg(rate_limit.refill_rate)
        .arg(now)
        .invoke_async(&mut conn)
        .await?;

    Ok(RateLimitResult {
        ok: result.0 == 1,
        remaining: u32::try_from(result.1).unwrap_or(0),
        retry_after: u64::try_from(result.2).unwrap_or(1).max(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_rate_limit_per_minute() {
        let limit = RateLimit::per_minute(60);
        assert_eq!(limit.bucket_capacity, 60);
        assert_eq!(limit.refill_rate, 1.0);

        let limit = RateLimit::per_minute(10);
        assert!((limit.refill_rate - 0.1667).abs() < 0.001);
    }

    #[test]
    fn test_client_address_uses_peer_without_trusted_proxy() {
        let mut headers = HeaderMap::new();
        let peer = ConnectInfo(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 4000));

        assert_eq!(client_address(&headers, Some(&peer), 0), "10.0.0.1");
        assert_eq!(client_address(&headers, None, 0), "unknown");

        // A client-supplied header cannot pick the bucket
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_address(&headers, Some(&peer), 0), "10.0.0.1");
    }

    #[test]
    fn test_client_address_reads_from_the_right() {
        let mut headers = HeaderMap::new();
        let peer = ConnectInfo(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 4000));

        // The client forged the first entry; the proxy appended the real address
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 203.0.113.7"));
        assert_eq!(client_address(&headers, Some(&peer), 1), "203.0.113.7");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 203.0.113.7, 192.168.1.5"),
        );
        assert_eq!(client_address(&headers, Some(&peer), 2), "203.0.113.7");

        // Fewer entries than proxies, or garbage, falls back to the peer
        assert_eq!(client_address(&headers, Some(&peer), 4), "10.0.0.1");
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        assert_eq!(client_address(&headers, Some(&peer), 1), "10.0.0.1");
    }
}
