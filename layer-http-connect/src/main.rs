//! MTProto-over-HTTP demo: first key-exchange round trip.
//!
//! # What this does
//!
//! 1. Pick the sandbox or live data centre from `LAYER_HTTP_MODE`
//! 2. Open an [`HttpConnection`] through [`TcpHttp`]
//! 3. Send an unencrypted `req_pq_multi` with a random nonce
//! 4. Receive `resPQ`, check the nonce echo and print `pq` and the
//!    server's public-key fingerprints
//!
//! # Run
//! ```text
//! RUST_LOG=debug LAYER_HTTP_MODE=live cargo run -p layer-http-connect
//! ```

use std::sync::Arc;

use layer_http::{Env, HttpConnection, TcpHttp};
use layer_mtproto::PlainSender;

// ── TL constructor IDs ────────────────────────────────────────────────────────

const ID_REQ_PQ_MULTI: u32 = 0xbe7e8ef1;
const ID_RES_PQ:       u32 = 0x05162463;
const ID_VECTOR:       u32 = 0x1cb5c415;

// ── req_pq_multi / resPQ ──────────────────────────────────────────────────────

fn req_pq_multi(nonce: &[u8; 16]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + 16);
    body.extend(ID_REQ_PQ_MULTI.to_le_bytes());
    body.extend(nonce);
    body
}

#[derive(Debug, PartialEq)]
struct ResPq {
    server_nonce: [u8; 16],
    pq:           Vec<u8>,
    fingerprints: Vec<i64>,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], &'static str> {
        let end = self.pos.checked_add(n).ok_or("length overflow")?;
        let out = self.buf.get(self.pos..end).ok_or("unexpected end of resPQ")?;
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, &'static str> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64, &'static str> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(i64::from_le_bytes(a))
    }

    fn int128(&mut self) -> Result<[u8; 16], &'static str> {
        let mut a = [0u8; 16];
        a.copy_from_slice(self.take(16)?);
        Ok(a)
    }

    /// TL `bytes`: 1- or 4-byte length prefix, data, padding to 4.
    fn bytes(&mut self) -> Result<Vec<u8>, &'static str> {
        let first = self.take(1)?[0];
        let (len, header) = if first != 0xfe {
            (first as usize, 1)
        } else {
            let b = self.take(3)?;
            (b[0] as usize | (b[1] as usize) << 8 | (b[2] as usize) << 16, 4)
        };
        let data = self.take(len)?.to_vec();
        self.take((4 - (header + len) % 4) % 4)?;
        Ok(data)
    }
}

fn parse_res_pq(body: &[u8], nonce: &[u8; 16]) -> Result<ResPq, &'static str> {
    let mut r = Reader { buf: body, pos: 0 };
    if r.u32()? != ID_RES_PQ {
        return Err("not a resPQ");
    }
    if &r.int128()? != nonce {
        return Err("nonce mismatch");
    }
    let server_nonce = r.int128()?;
    let pq = r.bytes()?;
    if r.u32()? != ID_VECTOR {
        return Err("fingerprints are not a vector");
    }
    let count = r.u32()? as usize;
    let fingerprints = (0..count).map(|_| r.i64()).collect::<Result<_, _>>()?;
    Ok(ResPq { server_nonce, pq, fingerprints })
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or("layer_http=info,layer_mtproto=info,layer_http_connect=info"),
    )
    .init();

    if let Err(e) = run().await {
        eprintln!("\n✗ {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let env = Env::from_env()?;
    let profile = env.profile();
    println!("Mode {} → {}:{}{} (app {} / {})",
        env.mode(), profile.host, profile.port, profile.path, profile.app.api_id, profile.app.title);

    let conn = HttpConnection::new(Arc::new(TcpHttp::new()), env.http_options());
    log::info!("[connect] target {}", conn.url());
    let mut sender = PlainSender::new(conn);

    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce).map_err(|e| format!("getrandom: {e}"))?;

    println!("\n[Step 1] Sending req_pq_multi …");
    let body = sender.invoke(&req_pq_multi(&nonce)).await?;
    let res_pq = parse_res_pq(&body, &nonce)?;

    println!("  ✓ ResPQ");
    println!("    server_nonce = {:02x?}", res_pq.server_nonce);
    println!("    pq           = {:02x?}", res_pq.pq);
    println!("    fingerprints = {:x?}", res_pq.fingerprints);

    sender.into_inner();
    println!("\n✓ HTTP transport round trip complete");
    Ok(())
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn res_pq_body(nonce: &[u8; 16]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend(ID_RES_PQ.to_le_bytes());
        b.extend(nonce);
        b.extend([7u8; 16]);
        // pq: 8 bytes → 1 length byte + 8 + 3 padding
        b.push(8);
        b.extend([0x17, 0xed, 0x48, 0x94, 0x1a, 0x08, 0xf9, 0x81]);
        b.extend([0u8; 3]);
        b.extend(ID_VECTOR.to_le_bytes());
        b.extend(1u32.to_le_bytes());
        b.extend((-0x3f2a_4b5c_6d7e_8f90i64).to_le_bytes());
        b
    }

    #[test]
    fn req_pq_multi_layout() {
        let body = req_pq_multi(&[9u8; 16]);
        assert_eq!(&body[..4], &[0xf1, 0x8e, 0x7e, 0xbe]);
        assert_eq!(&body[4..], &[9u8; 16]);
    }

    #[test]
    fn res_pq_parses() {
        let nonce = [3u8; 16];
        let res = parse_res_pq(&res_pq_body(&nonce), &nonce).unwrap();
        assert_eq!(res.server_nonce, [7u8; 16]);
        assert_eq!(res.pq, vec![0x17, 0xed, 0x48, 0x94, 0x1a, 0x08, 0xf9, 0x81]);
        assert_eq!(res.fingerprints, vec![-0x3f2a_4b5c_6d7e_8f90]);
    }

    #[test]
    fn res_pq_rejects_wrong_nonce() {
        let body = res_pq_body(&[3u8; 16]);
        assert_eq!(parse_res_pq(&body, &[4u8; 16]), Err("nonce mismatch"));
    }

    #[test]
    fn res_pq_rejects_truncated() {
        let nonce = [3u8; 16];
        let body = res_pq_body(&nonce);
        assert_eq!(parse_res_pq(&body[..30], &nonce), Err("unexpected end of resPQ"));
    }
}
