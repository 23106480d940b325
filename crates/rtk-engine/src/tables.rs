//! Constant lookup tables shared by the period math and effect code.
//!
//! Values are the historic trackers' tables; every pitch computation goes
//! through them so results match the original players bit for bit.

/// ProTracker periods for seven octaves, finetune 0.
pub const PROTRACKER_PERIODS: [u16; 84] = [
    1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960, 907,
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453,
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226,
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113,
    107, 101, 95, 90, 85, 80, 75, 71, 67, 63, 60, 56,
    53, 50, 47, 45, 42, 40, 37, 35, 33, 31, 30, 28,
    27, 25, 24, 22, 21, 20, 19, 18, 17, 16, 15, 14,
];

/// ProTracker periods for one octave at each of the 16 finetune steps
/// (0..=7, then -8..=-1), doubled so lower octaves can be reached by shifting.
pub const PROTRACKER_TUNED_PERIODS: [u16; 192] = [
    1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960, 906,
    1700, 1604, 1514, 1430, 1348, 1274, 1202, 1134, 1070, 1010, 954, 900,
    1688, 1592, 1504, 1418, 1340, 1264, 1194, 1126, 1064, 1004, 948, 894,
    1676, 1582, 1492, 1408, 1330, 1256, 1184, 1118, 1056, 996, 940, 888,
    1664, 1570, 1482, 1398, 1320, 1246, 1176, 1110, 1048, 990, 934, 882,
    1652, 1558, 1472, 1388, 1310, 1238, 1168, 1102, 1040, 982, 926, 874,
    1640, 1548, 1460, 1378, 1302, 1228, 1160, 1094, 1032, 974, 920, 868,
    1628, 1536, 1450, 1368, 1292, 1220, 1150, 1086, 1026, 968, 914, 862,
    1814, 1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960,
    1800, 1700, 1604, 1514, 1430, 1350, 1272, 1202, 1134, 1070, 1010, 954,
    1788, 1688, 1592, 1504, 1418, 1340, 1264, 1194, 1126, 1064, 1004, 948,
    1774, 1676, 1582, 1492, 1408, 1330, 1256, 1184, 1118, 1056, 996, 940,
    1762, 1664, 1570, 1482, 1398, 1320, 1246, 1176, 1110, 1048, 988, 934,
    1750, 1652, 1558, 1472, 1388, 1310, 1238, 1168, 1102, 1040, 982, 926,
    1736, 1640, 1548, 1460, 1378, 1302, 1228, 1160, 1094, 1032, 974, 920,
    1724, 1628, 1536, 1450, 1368, 1292, 1220, 1150, 1086, 1026, 968, 914,
];

/// S3M/IT periods for the lowest octave.
pub const FREQ_S3M: [u16; 12] = [
    1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960, 907,
];

/// Middle-C frequencies for the 16 MOD finetune steps (-8..=7).
pub const S3M_FINETUNE: [u32; 16] = [
    7895, 7941, 7985, 8046, 8107, 8169, 8232, 8280,
    8363, 8413, 8463, 8529, 8581, 8651, 8723, 8757,
];

/// FastTracker 2 Amiga-mode periods, 8 finetune steps per semitone.
pub const XM_PERIODS: [u16; 104] = [
    907, 900, 894, 887, 881, 875, 868, 862, 856, 850, 844, 838,
    832, 826, 820, 814, 808, 802, 796, 791, 785, 779, 774, 768,
    762, 757, 752, 746, 741, 736, 730, 725, 720, 715, 709, 704,
    699, 694, 689, 684, 678, 675, 670, 665, 660, 655, 651, 646,
    640, 636, 632, 628, 623, 619, 614, 610, 604, 601, 597, 592,
    588, 584, 580, 575, 570, 567, 563, 559, 555, 551, 547, 543,
    538, 535, 532, 528, 524, 520, 516, 513, 508, 505, 502, 498,
    494, 491, 487, 484, 480, 477, 474, 470, 467, 463, 460, 457,
    453, 450, 447, 443, 440, 437, 434, 431,
];

/// `65536 * 2^(i/192)`: 1/16 semitone steps upwards.
pub const LINEAR_SLIDE_UP: [u32; 256] = [
    65536, 65773, 66011, 66250, 66489, 66730, 66971, 67213,
    67456, 67700, 67945, 68191, 68438, 68685, 68933, 69183,
    69433, 69684, 69936, 70189, 70443, 70698, 70953, 71210,
    71468, 71726, 71985, 72246, 72507, 72769, 73032, 73297,
    73562, 73828, 74095, 74363, 74632, 74902, 75172, 75444,
    75717, 75991, 76266, 76542, 76819, 77096, 77375, 77655,
    77936, 78218, 78501, 78785, 79069, 79355, 79642, 79930,
    80220, 80510, 80801, 81093, 81386, 81681, 81976, 82273,
    82570, 82869, 83169, 83469, 83771, 84074, 84378, 84683,
    84990, 85297, 85606, 85915, 86226, 86538, 86851, 87165,
    87480, 87796, 88114, 88433, 88752, 89073, 89396, 89719,
    90043, 90369, 90696, 91024, 91353, 91684, 92015, 92348,
    92682, 93017, 93354, 93691, 94030, 94370, 94711, 95054,
    95398, 95743, 96089, 96436, 96785, 97135, 97487, 97839,
    98193, 98548, 98905, 99262, 99621, 99982, 100343, 100706,
    101070, 101436, 101803, 102171, 102540, 102911, 103283, 103657,
    104032, 104408, 104786, 105165, 105545, 105927, 106310, 106694,
    107080, 107468, 107856, 108246, 108638, 109031, 109425, 109821,
    110218, 110617, 111017, 111418, 111821, 112226, 112631, 113039,
    113448, 113858, 114270, 114683, 115098, 115514, 115932, 116351,
    116772, 117194, 117618, 118043, 118470, 118899, 119329, 119760,
    120194, 120628, 121065, 121502, 121942, 122383, 122825, 123270,
    123715, 124163, 124612, 125063, 125515, 125969, 126425, 126882,
    127341, 127801, 128263, 128727, 129193, 129660, 130129, 130600,
    131072, 131546, 132022, 132499, 132978, 133459, 133942, 134427,
    134913, 135401, 135890, 136382, 136875, 137370, 137867, 138366,
    138866, 139368, 139872, 140378, 140886, 141395, 141907, 142420,
    142935, 143452, 143971, 144491, 145014, 145539, 146065, 146593,
    147123, 147655, 148189, 148725, 149263, 149803, 150345, 150889,
    151434, 151982, 152532, 153083, 153637, 154193, 154750, 155310,
    155872, 156435, 157001, 157569, 158139, 158711, 159285, 159861,
    160439, 161019, 161602, 162186, 162773, 163361, 163952, 164545,
];

/// `65536 * 2^(-i/192)`: 1/16 semitone steps downwards.
pub const LINEAR_SLIDE_DOWN: [u32; 256] = [
    65536, 65300, 65065, 64830, 64596, 64364, 64132, 63901,
    63670, 63441, 63212, 62984, 62757, 62531, 62306, 62081,
    61858, 61635, 61413, 61191, 60971, 60751, 60532, 60314,
    60097, 59880, 59664, 59449, 59235, 59022, 58809, 58597,
    58386, 58176, 57966, 57757, 57549, 57341, 57135, 56929,
    56724, 56519, 56316, 56113, 55911, 55709, 55508, 55308,
    55109, 54910, 54713, 54515, 54319, 54123, 53928, 53734,
    53540, 53347, 53155, 52963, 52773, 52582, 52393, 52204,
    52016, 51829, 51642, 51456, 51270, 51085, 50901, 50718,
    50535, 50353, 50172, 49991, 49811, 49631, 49452, 49274,
    49097, 48920, 48743, 48568, 48393, 48218, 48044, 47871,
    47699, 47527, 47356, 47185, 47015, 46846, 46677, 46509,
    46341, 46174, 46008, 45842, 45677, 45512, 45348, 45185,
    45022, 44859, 44698, 44537, 44376, 44216, 44057, 43898,
    43740, 43582, 43425, 43269, 43113, 42958, 42803, 42649,
    42495, 42342, 42189, 42037, 41886, 41735, 41584, 41434,
    41285, 41136, 40988, 40840, 40693, 40547, 40400, 40255,
    40110, 39965, 39821, 39678, 39535, 39392, 39250, 39109,
    38968, 38828, 38688, 38548, 38409, 38271, 38133, 37996,
    37859, 37722, 37586, 37451, 37316, 37181, 37047, 36914,
    36781, 36648, 36516, 36385, 36254, 36123, 35993, 35863,
    35734, 35605, 35477, 35349, 35221, 35095, 34968, 34842,
    34716, 34591, 34467, 34343, 34219, 34095, 33973, 33850,
    33728, 33607, 33486, 33365, 33245, 33125, 33005, 32887,
    32768, 32650, 32532, 32415, 32298, 32182, 32066, 31950,
    31835, 31720, 31606, 31492, 31379, 31266, 31153, 31041,
    30929, 30817, 30706, 30596, 30485, 30376, 30266, 30157,
    30048, 29940, 29832, 29725, 29618, 29511, 29405, 29299,
    29193, 29088, 28983, 28879, 28774, 28671, 28567, 28464,
    28362, 28260, 28158, 28056, 27955, 27855, 27754, 27654,
    27554, 27455, 27356, 27258, 27159, 27062, 26964, 26867,
    26770, 26674, 26577, 26482, 26386, 26291, 26196, 26102,
];

/// `65536 * 2^(i/768)`: 1/64 semitone steps upwards.
pub const FINE_LINEAR_SLIDE_UP: [u32; 16] = [
    65536, 65595, 65654, 65714, 65773, 65832, 65892, 65951,
    66011, 66071, 66130, 66190, 66250, 66309, 66369, 66429,
];

/// `65536 * 2^(-i/768)`: 1/64 semitone steps downwards.
pub const FINE_LINEAR_SLIDE_DOWN: [u32; 16] = [
    65536, 65477, 65418, 65359, 65300, 65241, 65182, 65123,
    65065, 65006, 64947, 64889, 64830, 64772, 64713, 64655,
];

/// FastTracker 2 linear frequency table, one octave in 768 steps.
pub const XM_LINEAR_FREQ: [u32; 768] = [
    535232, 534749, 534267, 533785, 533303, 532822, 532341, 531861,
    531381, 530902, 530423, 529945, 529466, 528989, 528512, 528035,
    527558, 527083, 526607, 526132, 525657, 525183, 524709, 524236,
    523763, 523291, 522819, 522347, 521876, 521405, 520934, 520465,
    519995, 519526, 519057, 518589, 518121, 517654, 517187, 516720,
    516254, 515788, 515323, 514858, 514394, 513930, 513466, 513003,
    512540, 512078, 511616, 511154, 510693, 510232, 509772, 509312,
    508853, 508394, 507935, 507477, 507019, 506561, 506104, 505648,
    505192, 504736, 504281, 503826, 503371, 502917, 502463, 502010,
    501557, 501105, 500653, 500201, 499750, 499299, 498849, 498399,
    497949, 497500, 497051, 496602, 496154, 495707, 495260, 494813,
    494367, 493921, 493475, 493030, 492585, 492141, 491697, 491253,
    490810, 490367, 489925, 489483, 489041, 488600, 488159, 487719,
    487279, 486839, 486400, 485961, 485523, 485085, 484647, 484210,
    483773, 483337, 482901, 482465, 482030, 481595, 481161, 480727,
    480293, 479860, 479427, 478994, 478562, 478130, 477699, 477268,
    476838, 476407, 475978, 475548, 475119, 474691, 474262, 473834,
    473407, 472980, 472553, 472127, 471701, 471275, 470850, 470426,
    470001, 469577, 469154, 468730, 468307, 467885, 467463, 467041,
    466620, 466199, 465778, 465358, 464938, 464519, 464100, 463681,
    463263, 462845, 462427, 462010, 461593, 461177, 460761, 460345,
    459930, 459515, 459101, 458686, 458273, 457859, 457446, 457033,
    456621, 456209, 455798, 455386, 454976, 454565, 454155, 453745,
    453336, 452927, 452519, 452110, 451702, 451295, 450888, 450481,
    450075, 449669, 449263, 448858, 448453, 448048, 447644, 447240,
    446837, 446434, 446031, 445628, 445226, 444825, 444424, 444023,
    443622, 443222, 442822, 442423, 442023, 441625, 441226, 440828,
    440430, 440033, 439636, 439240, 438843, 438447, 438052, 437657,
    437262, 436867, 436473, 436080, 435686, 435293, 434900, 434508,
    434116, 433725, 433333, 432942, 432552, 432162, 431772, 431382,
    430993, 430604, 430216, 429828, 429440, 429052, 428665, 428279,
    427892, 427506, 427121, 426735, 426350, 425966, 425581, 425198,
    424814, 424431, 424048, 423665, 423283, 422901, 422520, 422139,
    421758, 421377, 420997, 420617, 420238, 419859, 419480, 419102,
    418723, 418346, 417968, 417591, 417215, 416838, 416462, 416086,
    415711, 415336, 414961, 414587, 414213, 413839, 413466, 413093,
    412720, 412348, 411976, 411604, 411233, 410862, 410491, 410121,
    409751, 409381, 409012, 408643, 408274, 407906, 407538, 407171,
    406803, 406436, 406070, 405703, 405337, 404972, 404606, 404241,
    403877, 403512, 403148, 402784, 402421, 402058, 401695, 401333,
    400971, 400609, 400248, 399887, 399526, 399166, 398805, 398446,
    398086, 397727, 397368, 397010, 396652, 396294, 395936, 395579,
    395222, 394866, 394510, 394154, 393798, 393443, 393088, 392733,
    392379, 392025, 391671, 391318, 390965, 390612, 390260, 389908,
    389556, 389205, 388854, 388503, 388152, 387802, 387452, 387103,
    386754, 386405, 386056, 385708, 385360, 385012, 384665, 384318,
    383971, 383625, 383279, 382933, 382587, 382242, 381897, 381553,
    381209, 380865, 380521, 380178, 379835, 379492, 379150, 378808,
    378466, 378125, 377784, 377443, 377102, 376762, 376422, 376083,
    375743, 375404, 375066, 374727, 374389, 374052, 373714, 373377,
    373040, 372704, 372367, 372032, 371696, 371361, 371026, 370691,
    370356, 370022, 369689, 369355, 369022, 368689, 368356, 368024,
    367692, 367360, 367029, 366698, 366367, 366036, 365706, 365376,
    365047, 364717, 364388, 364060, 363731, 363403, 363075, 362748,
    362420, 362094, 361767, 361440, 361114, 360789, 360463, 360138,
    359813, 359489, 359164, 358840, 358516, 358193, 357870, 357547,
    357225, 356902, 356580, 356259, 355937, 355616, 355295, 354975,
    354655, 354335, 354015, 353696, 353376, 353058, 352739, 352421,
    352103, 351785, 351468, 351151, 350834, 350518, 350201, 349886,
    349570, 349255, 348939, 348625, 348310, 347996, 347682, 347368,
    347055, 346742, 346429, 346117, 345804, 345492, 345181, 344869,
    344558, 344247, 343937, 343627, 343317, 343007, 342697, 342388,
    342079, 341771, 341462, 341154, 340847, 340539, 340232, 339925,
    339618, 339312, 339006, 338700, 338394, 338089, 337784, 337479,
    337175, 336871, 336567, 336263, 335960, 335657, 335354, 335052,
    334749, 334447, 334146, 333844, 333543, 333242, 332941, 332641,
    332341, 332041, 331742, 331442, 331143, 330845, 330546, 330248,
    329950, 329652, 329355, 329058, 328761, 328464, 328168, 327872,
    327576, 327281, 326986, 326691, 326396, 326101, 325807, 325513,
    325220, 324926, 324633, 324340, 324048, 323755, 323463, 323171,
    322880, 322589, 322298, 322007, 321716, 321426, 321136, 320846,
    320557, 320268, 319979, 319690, 319402, 319114, 318826, 318538,
    318251, 317964, 317677, 317390, 317104, 316818, 316532, 316247,
    315961, 315676, 315391, 315107, 314823, 314539, 314255, 313971,
    313688, 313405, 313122, 312840, 312558, 312276, 311994, 311713,
    311431, 311150, 310870, 310589, 310309, 310029, 309749, 309470,
    309191, 308912, 308633, 308355, 308077, 307799, 307521, 307244,
    306966, 306690, 306413, 306136, 305860, 305584, 305309, 305033,
    304758, 304483, 304208, 303934, 303660, 303386, 303112, 302839,
    302566, 302293, 302020, 301747, 301475, 301203, 300932, 300660,
    300389, 300118, 299847, 299577, 299306, 299036, 298767, 298497,
    298228, 297959, 297690, 297421, 297153, 296885, 296617, 296350,
    296082, 295815, 295548, 295282, 295015, 294749, 294483, 294218,
    293952, 293687, 293422, 293157, 292893, 292629, 292365, 292101,
    291837, 291574, 291311, 291048, 290786, 290523, 290261, 289999,
    289738, 289476, 289215, 288954, 288694, 288433, 288173, 287913,
    287653, 287394, 287135, 286876, 286617, 286358, 286100, 285842,
    285584, 285326, 285069, 284812, 284555, 284298, 284042, 283785,
    283529, 283273, 283018, 282763, 282508, 282253, 281998, 281744,
    281489, 281236, 280982, 280728, 280475, 280222, 279969, 279717,
    279464, 279212, 278960, 278709, 278457, 278206, 277955, 277704,
    277454, 277204, 276953, 276704, 276454, 276205, 275955, 275706,
    275458, 275209, 274961, 274713, 274465, 274217, 273970, 273723,
    273476, 273229, 272983, 272737, 272491, 272245, 271999, 271754,
    271509, 271264, 271019, 270774, 270530, 270286, 270042, 269799,
    269555, 269312, 269069, 268826, 268584, 268342, 268100, 267858,
];

/// Impulse Tracker sine, 256 steps, amplitude 64.
pub const IT_SINUS: [i8; 256] = [
    0, 2, 3, 5, 6, 8, 9, 11, 12, 14, 16, 17, 19, 20, 22, 23,
    24, 26, 27, 29, 30, 32, 33, 34, 36, 37, 38, 39, 41, 42, 43, 44,
    45, 46, 47, 48, 49, 50, 51, 52, 53, 54, 55, 56, 56, 57, 58, 59,
    59, 60, 60, 61, 61, 62, 62, 62, 63, 63, 63, 64, 64, 64, 64, 64,
    64, 64, 64, 64, 64, 64, 63, 63, 63, 62, 62, 62, 61, 61, 60, 60,
    59, 59, 58, 57, 56, 56, 55, 54, 53, 52, 51, 50, 49, 48, 47, 46,
    45, 44, 43, 42, 41, 39, 38, 37, 36, 34, 33, 32, 30, 29, 27, 26,
    24, 23, 22, 20, 19, 17, 16, 14, 12, 11, 9, 8, 6, 5, 3, 2,
    0, -2, -3, -5, -6, -8, -9, -11, -12, -14, -16, -17, -19, -20, -22, -23,
    -24, -26, -27, -29, -30, -32, -33, -34, -36, -37, -38, -39, -41, -42, -43, -44,
    -45, -46, -47, -48, -49, -50, -51, -52, -53, -54, -55, -56, -56, -57, -58, -59,
    -59, -60, -60, -61, -61, -62, -62, -62, -63, -63, -63, -64, -64, -64, -64, -64,
    -64, -64, -64, -64, -64, -64, -63, -63, -63, -62, -62, -62, -61, -61, -60, -60,
    -59, -59, -58, -57, -56, -56, -55, -54, -53, -52, -51, -50, -49, -48, -47, -46,
    -45, -44, -43, -42, -41, -39, -38, -37, -36, -34, -33, -32, -30, -29, -27, -26,
    -24, -23, -22, -20, -19, -17, -16, -14, -12, -11, -9, -8, -6, -5, -3, -2,
];

/// Classic sine, 64 steps, amplitude 127.
pub const MOD_SINUS: [i8; 64] = [
    0, 12, 25, 37, 49, 60, 71, 81, 90, 98, 106, 112, 117, 122, 125, 126,
    127, 126, 125, 122, 117, 112, 106, 98, 90, 81, 71, 60, 49, 37, 25, 12,
    0, -12, -25, -37, -49, -60, -71, -81, -90, -98, -106, -112, -117, -122, -125, -126,
    -127, -126, -125, -122, -117, -112, -106, -98, -90, -81, -71, -60, -49, -37, -25, -12,
];

pub const MOD_RAMP_DOWN: [i8; 64] = [
    0, -4, -8, -12, -16, -20, -24, -28, -32, -36, -40, -44, -48, -52, -56, -60,
    -64, -68, -72, -76, -80, -84, -88, -92, -96, -100, -104, -108, -112, -116, -120, -124,
    127, 123, 119, 115, 111, 107, 103, 99, 95, 91, 87, 83, 79, 75, 71, 67,
    63, 59, 55, 51, 47, 43, 39, 35, 31, 27, 23, 19, 15, 11, 7, 3,
];

pub const MOD_SQUARE: [i8; 64] = [
    127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127,
    127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127, 127,
    -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127,
    -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127, -127,
];

pub const MOD_RANDOM: [i8; 64] = [
    -8, -94, -15, -64, -15, 71, 40, 97, -3, -11, -100, 79, 18, -41, -112, 76,
    -76, -9, 39, 42, 4, -99, -105, -29, 97, -21, -9, -14, -71, 20, 35, -74,
    112, -6, -109, -27, -63, -111, -125, 87, -101, 4, -125, 113, 61, 2, 66, -121,
    88, 65, -28, -38, -11, 47, 80, 1, -119, -71, 115, 28, -54, 59, 68, 122,
];

/// Retrigger volume change by code: multiplier and divisor, `(1, 1)` when additive.
pub const RETRIG_MULTIPLY: [(u8, u8); 16] = [
    (1, 1), (1, 1), (1, 1), (1, 1), (1, 1), (1, 1), (2, 3), (1, 2),
    (1, 1), (1, 1), (1, 1), (1, 1), (1, 1), (1, 1), (3, 2), (2, 1),
];

/// Retrigger volume change by code: additive delta in 0-64 units.
pub const RETRIG_ADD: [i8; 16] = [0, -1, -2, -4, -8, -16, 0, 0, 0, 1, 2, 4, 8, 16, 0, 0];

/// Impulse Tracker volume column tone portamento speeds.
pub const IT_VOLCOL_PORTA: [u8; 10] = [0x00, 0x01, 0x04, 0x08, 0x10, 0x20, 0x40, 0x60, 0x80, 0xFF];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slide_tables_are_reciprocal() {
        for i in 0..256 {
            let product = LINEAR_SLIDE_UP[i] as u64 * LINEAR_SLIDE_DOWN[i] as u64;
            let unit = 65536u64 * 65536;
            assert!(product.abs_diff(unit) < unit / 10_000, "index {i}");
        }
    }

    #[test]
    fn twelve_semitones_double() {
        assert_eq!(LINEAR_SLIDE_UP[192], 131072);
        assert_eq!(LINEAR_SLIDE_DOWN[192], 32768);
    }

    #[test]
    fn tuned_periods_row_zero_is_doubled_octave_one() {
        for i in 0..12 {
            assert_eq!(PROTRACKER_TUNED_PERIODS[i], PROTRACKER_PERIODS[12 + i] * 2);
        }
    }

    #[test]
    fn sine_tables_are_odd() {
        for i in 1..128 {
            assert_eq!(IT_SINUS[i], -IT_SINUS[256 - i]);
        }
        assert_eq!(MOD_SINUS[16], 127);
    }
}
