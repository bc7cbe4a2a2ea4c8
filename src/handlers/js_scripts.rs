//! JavaScript evaluation scripts
//!
//! Scripts return plain JSON so they deserialize straight into Rust structs.

/// Page title and author for backfilling item metadata
pub const PAGE_META_SCRIPT: &str = r#"
    (() => {
        const meta = {};
        document.querySelectorAll('meta').forEach(tag => {
            const name = tag.getAttribute('name') || tag.getAttribute('property');
            if (name) {
                meta[name.toLowerCase()] = tag.getAttribute('content');
            }
        });
        return {
            title: meta['og:title'] || document.title || null,
            author: meta['author'] || meta['article:author'] || meta['twitter:creator'] || null
        };
    })()
"#;

/// Every media reference in the rendered DOM
///
/// Covers `<img>` (src, best `srcset` candidate, lazy `data-*` attributes),
/// `<picture><source>`, `<video>`/`<audio>` and their sources, `og:image` /
/// `og:video` metadata and inline CSS background images.
pub const MEDIA_SCRIPT: &str = r#"
    (() => {
        const out = [];
        const seen = new Set();
        const push = (url, type, extra) => {
            if (!url) return;
            let abs;
            try { abs = new URL(url, document.baseURI).href; } catch (e) { return; }
            if (!abs.startsWith('http') || seen.has(abs)) return;
            seen.add(abs);
            out.push(Object.assign({ url: abs, type: type }, extra || {}));
        };
        const bestFromSrcset = (srcset) => {
            if (!srcset) return null;
            let best = null, bestW = -1;
            srcset.split(',').forEach(part => {
                const bits = part.trim().split(/\s+/);
                if (!bits[0]) return;
                const d = bits[1] || '';
                let w = 0;
                if (d.endsWith('w')) w = parseInt(d, 10) || 0;
                else if (d.endsWith('x')) w = Math.round((parseFloat(d) || 1) * 1000);
                if (w > bestW) { bestW = w; best = bits[0]; }
            });
            return best;
        };

        document.querySelectorAll('img').forEach(img => {
            const lazy = img.getAttribute('data-src') || img.getAttribute('data-original')
                || img.getAttribute('data-lazy-src') || img.getAttribute('data-full');
            const src = bestFromSrcset(img.getAttribute('srcset') || img.getAttribute('data-srcset'))
                || lazy || img.currentSrc || img.src;
            push(src, 'image', {
                alt: img.alt || null,
                title: img.title || null,
                width: img.naturalWidth || img.width || 0,
                height: img.naturalHeight || img.height || 0
            });
        });
        document.querySelectorAll('picture source[srcset]').forEach(s => {
            push(bestFromSrcset(s.getAttribute('srcset')), 'image');
        });
        document.querySelectorAll('video').forEach(v => {
            push(v.currentSrc || v.src, 'video', { title: v.title || null });
            v.querySelectorAll('source[src]').forEach(s => push(s.src, 'video'));
        });
        document.querySelectorAll('audio').forEach(a => {
            push(a.currentSrc || a.src, 'audio', { title: a.title || null });
            a.querySelectorAll('source[src]').forEach(s => push(s.src, 'audio'));
        });
        document.querySelectorAll('meta[property="og:image"], meta[name="og:image"]').forEach(m => {
            push(m.content, 'image');
        });
        document.querySelectorAll('meta[property="og:video"], meta[property="og:video:url"]').forEach(m => {
            push(m.content, 'video');
        });
        document.querySelectorAll('[style*="background"]').forEach(el => {
            const match = /url\(["']?([^"')]+)["']?\)/.exec(el.getAttribute('style') || '');
            if (match) push(match[1], 'image');
        });
        return out;
    })()
"#;
